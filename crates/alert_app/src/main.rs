//! Command-line entry point: one harvest batch per invocation.
mod config;

use std::path::PathBuf;

use alert_engine::{
    GmailClient, HarvestEvent, Harvester, JsonFileSink, MemoryRecordSink, RecordSink,
    SqliteRecordSink,
};
use alert_logging::{alert_error, alert_info, alert_warn};
use anyhow::{Context, Result};

use crate::config::{AppConfig, SinkConfig, DEFAULT_CONFIG_FILENAME};

fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let config = config::load(&config_path)?;

    alert_logging::initialize(
        config.log.destination,
        config.log.level_filter()?,
        &config.log.file,
    );
    alert_info!("alert_harvester starting with config {:?}", config_path);

    let result = run(&config);
    if let Err(err) = &result {
        alert_error!("harvest failed: {:#}", err);
    }
    result
}

fn run(config: &AppConfig) -> Result<()> {
    let token = config.gmail.access_token()?;
    let mailbox = GmailClient::new(config.gmail.settings(), token)
        .context("building mailbox client")?;
    let harvester = Harvester::new(config.decode.clone(), config.extract.clone())
        .context("compiling extraction selectors")?;
    let mut sink = open_sink(&config.sink)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let outcome = runtime.block_on(harvester.run(&mailbox, sink.as_mut(), &log_progress));

    // Close even when the batch failed so stored rows are flushed.
    sink.close().context("closing record sink")?;
    let report = outcome?;

    for failure in &report.failures {
        alert_warn!(
            "message {} failed at {}: {}",
            failure.message_id,
            failure.stage,
            failure.reason
        );
    }
    alert_info!("{}", report);
    Ok(())
}

fn open_sink(config: &SinkConfig) -> Result<Box<dyn RecordSink>> {
    let sink: Box<dyn RecordSink> = match config {
        SinkConfig::Sqlite { path } => Box::new(
            SqliteRecordSink::open(path)
                .with_context(|| format!("opening sqlite store {}", path.display()))?,
        ),
        SinkConfig::Json { dir, filename } => Box::new(
            JsonFileSink::open(dir, filename)
                .with_context(|| format!("opening json export in {}", dir.display()))?,
        ),
        SinkConfig::Memory => Box::new(MemoryRecordSink::new()),
    };
    Ok(sink)
}

fn log_progress(event: HarvestEvent) {
    match event {
        HarvestEvent::Listed { count } => alert_info!("{} unread alert messages", count),
        HarvestEvent::MessageCompleted {
            message_id,
            records,
            skipped,
            stored,
        } => alert_info!(
            "message {}: {} records ({} new), {} skipped",
            message_id,
            records,
            stored,
            skipped
        ),
        HarvestEvent::MessageFailed { message_id, stage } => {
            alert_warn!("message {} failed during {}", message_id, stage)
        }
    }
}
