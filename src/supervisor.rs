// src/supervisor.rs
use anyhow::Result;
use metrics::gauge;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::cadence::Cadence;
use crate::config::WatcherConfig;
use crate::dedup::DedupStore;
use crate::failure::FailureTracker;
use crate::filter::KeywordFilter;
use crate::ingest::{Fetcher, Source};
use crate::monitor::{MonitorDeps, SourceMonitor};
use crate::notify::NotificationRouter;

/// Owns one monitor per source and keeps them running until shutdown.
pub struct Supervisor {
    monitors: Vec<SourceMonitor>,
    cadence: Arc<dyn Cadence>,
}

impl Supervisor {
    pub fn new(sources: Vec<Source>, deps: MonitorDeps) -> Self {
        let cadence = deps.cadence.clone();
        let monitors = sources
            .into_iter()
            .map(|s| SourceMonitor::new(s, deps.clone()))
            .collect();
        Self { monitors, cadence }
    }

    pub fn from_config(
        cfg: &WatcherConfig,
        fetcher: Arc<dyn Fetcher>,
        router: NotificationRouter,
    ) -> Result<Self> {
        let cadence: Arc<dyn Cadence> = Arc::from(cfg.build_cadence()?);
        let deps = MonitorDeps {
            fetcher,
            dedup: Arc::new(DedupStore::new(cfg.dedup_policy())),
            failures: Arc::new(FailureTracker::new(cfg.failure_threshold)),
            filter: Arc::new(KeywordFilter::new(cfg.keywords.as_slice())),
            router: Arc::new(router),
            cadence,
            batch_size: cfg.batch_size,
        };
        Ok(Self::new(cfg.sources(), deps))
    }

    /// The cadence shared by every monitor.
    pub fn cadence(&self) -> &Arc<dyn Cadence> {
        &self.cadence
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;
        Ok(())
    }

    /// Run every monitor concurrently until `shutdown` resolves, then drop them.
    /// In-flight polls and notifications are not drained.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut set = JoinSet::new();
        for m in self.monitors {
            set.spawn(m.run());
        }
        gauge!("watcher_monitors").set(set.len() as f64);
        tracing::info!(monitors = set.len(), "all monitors started");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("interrupted, exiting");
                    break;
                }
                Some(res) = set.join_next() => {
                    // monitors loop forever; reaching here means one died
                    if let Err(e) = res {
                        tracing::error!(error = %e, "monitor task ended");
                    }
                    gauge!("watcher_monitors").set(set.len() as f64);
                }
            }
        }

        set.abort_all();
        gauge!("watcher_monitors").set(0.0);
    }
}
