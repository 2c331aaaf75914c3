use anyhow::Context;
use clap::Parser;
use landing_zone_processing::io::cloud::{
    FileTaskNotifier, LocalObjectIO, LogTaskNotifier, TaskNotifier,
};
use landing_zone_processing::{ProcessorConfig, handle_invocation, logging};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Convert landed CSV files to Parquet against their registered Avro schemas.
///
/// Buckets are directories below the storage root. Settings are read from the
/// environment: OUTPUT_BUCKET, SCHEMA_REGISTRY_BUCKET, VIOLATIONS_BUCKET,
/// VIOLATIONS_PATH, CHARSET, NUMBER_OF_HEADER_ROWS_TO_SKIP and LOG_CSV.
#[derive(Debug, Parser)]
#[command(name = "landing-zone-processor", version)]
struct Cli {
    /// Invocation payload JSON file, or `-` for stdin.
    #[arg(long, default_value = "-")]
    payload: String,

    /// Directory holding one subdirectory per bucket.
    #[arg(long, env = "LANDING_ZONE_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Append workflow notifications to this JSON Lines file instead of logging them.
    #[arg(long)]
    notifications: Option<PathBuf>,
}

fn main() -> ExitCode {
    logging::init();
    if let Err(e) = real_main() {
        error!("{e:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn read_payload(source: &str) -> anyhow::Result<serde_json::Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read payload from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("read payload {source}"))?
    };
    serde_json::from_str(&text).context("parse payload JSON")
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ProcessorConfig::from_env().context("load configuration")?;
    info!(?config, root = %cli.storage_root.display(), "starting");

    let payload = read_payload(&cli.payload)?;
    let storage = LocalObjectIO::new(&cli.storage_root);
    let notifier: Box<dyn TaskNotifier> = match &cli.notifications {
        Some(path) => Box::new(FileTaskNotifier::new(path)),
        None => Box::new(LogTaskNotifier),
    };

    let message = handle_invocation(payload, &storage, notifier.as_ref(), &config)
        .context("process invocation")?;
    println!("{message}");
    Ok(())
}
