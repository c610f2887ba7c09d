//! keyword-watcher — binary entrypoint.
//! Loads config, wires the mirror fetcher and notification channels,
//! then runs one monitor per source until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use keyword_watcher::ingest::providers::nitter_rss::NitterRssFetcher;
use keyword_watcher::{telemetry, NotificationRouter, Supervisor, WatcherConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    telemetry::init_tracing();
    telemetry::init_metrics_from_env()?;

    let cfg = match WatcherConfig::load_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "cannot load config, exiting");
            return Err(e);
        }
    };

    let fetcher = NitterRssFetcher::new(
        cfg.fetch.instances.clone(),
        Duration::from_secs(cfg.fetch.timeout_secs),
    )?;
    let router = NotificationRouter::from_config(&cfg.channels)?;
    let channels = router.channel_names();

    let supervisor = Supervisor::from_config(&cfg, Arc::new(fetcher), router)?;

    tracing::info!(sources = ?cfg.sources, "watching");
    tracing::info!(keywords = ?cfg.keywords, "keywords");
    tracing::info!(instances = ?cfg.fetch.instances, "mirrors");
    tracing::info!(
        ?channels,
        failure_threshold = cfg.failure_threshold,
        batch_size = cfg.batch_size,
        cadence = %supervisor.cadence().describe(),
        dedup = ?cfg.dedup_policy(),
        "starting"
    );

    supervisor.run().await
}
