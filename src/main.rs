//! Survey Export
//!
//! Runs one export job and exits.
//!
//! # Usage
//!
//! ```bash
//! survey-export --mode csv '{"survey":"abc","bucket":"exports","s3Object":"abc/out.csv"}'
//! ```
//!
//! On success a single `{"type":"result","data":null}` line is written to
//! stdout. Logs go to stderr; a failed export exits with status 1.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use survey_export::cli::{self, CliInterface};
use survey_export::error::Result;
use survey_export::export::{CommandTool, ExportPipeline, ObjectStoreBlobStore, PipelineSettings};
use survey_export::model::ExportJob;
use survey_export::store::MongoSurveyStore;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Connect to the document store
/// 4. Run the export pipeline and report the result
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    let job = ExportJob::from_json(&cli.args().job, cli.args().mode.as_deref())?;
    let config = cli.config();

    info!(
        "Connecting to {}",
        CliInterface::sanitize_uri(&config.store.uri)
    );
    let store = Arc::new(MongoSurveyStore::connect(&config.store).await?);

    let mut pipeline = ExportPipeline::new(
        store.clone(),
        Arc::new(ObjectStoreBlobStore::from_config(config.storage.clone())),
        Arc::new(CommandTool::from_config(&config.converter)),
        PipelineSettings::from_config(config),
    );
    let outcome = pipeline.run(&job).await;

    drop(pipeline);
    if let Ok(store) = Arc::try_unwrap(store) {
        store.shutdown().await;
    }

    outcome?;
    println!("{}", cli::result_line());
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// Logs are written to stderr so stdout carries only the result line.
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
