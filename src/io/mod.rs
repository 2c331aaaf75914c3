//! Storage seams and text input.
//!
//! - [`cloud`]: object storage and workflow notifier traits, with in-memory and
//!   filesystem implementations
//! - [`csv`]: decoding landed bytes and splitting them into untyped rows

pub mod cloud;
pub mod csv;
