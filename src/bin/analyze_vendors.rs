//! Runs one analysis batch from the command line.
//!
//! Usage: `analyze_vendors <vendor> [<vendor>...]`
//!
//! Prints the batch report as JSON on stdout, the summary on stderr, and
//! saves the records to `DATA_FILE`. Ctrl-C stops vendors that have not
//! started yet.

use std::env;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crm_intel::config::Config;
use crm_intel::pipeline::{Analyzer, BatchOptions};
use crm_intel::store::{JsonFileStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_intel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let names: Vec<String> = env::args().skip(1).collect();
    if names.is_empty() {
        anyhow::bail!("usage: analyze_vendors <vendor> [<vendor>...]");
    }

    let config = Config::from_env()?;
    let analyzer = Analyzer::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing vendors already in progress");
            on_signal.cancel();
        }
    });

    let report = analyzer
        .analyze_with(
            &names,
            BatchOptions {
                refresh: true,
                cancel,
            },
        )
        .await;

    let store = JsonFileStore::new(config.data_file.clone());
    if let Err(e) = store.save(&report.records).await {
        tracing::error!("Failed to save records: {}", e);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    let summary = &report.summary;
    eprintln!(
        "{} complete, {} degraded, {} skipped, {} cancelled (of {})",
        summary.complete, summary.degraded, summary.skipped, summary.cancelled, summary.total
    );
    for record in report.records.iter().filter(|r| r.is_degraded()) {
        let reasons: Vec<String> = record.degradation().iter().map(|f| f.to_string()).collect();
        eprintln!("  {}: {}", record.vendor(), reasons.join("; "));
    }

    Ok(())
}
