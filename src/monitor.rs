// src/monitor.rs
//! Per-source poll loop: fetch, dedup, keyword filter, notify, sleep.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;

use crate::cadence::Cadence;
use crate::dedup::DedupStore;
use crate::failure::FailureTracker;
use crate::filter::KeywordFilter;
use crate::ingest::{preview, Fetcher, Item, Source};
use crate::notify::{AlertMessage, NotificationRouter};

pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Shared collaborators handed to every monitor.
#[derive(Clone)]
pub struct MonitorDeps {
    pub fetcher: Arc<dyn Fetcher>,
    pub dedup: Arc<DedupStore>,
    pub failures: Arc<FailureTracker>,
    pub filter: Arc<KeywordFilter>,
    pub router: Arc<NotificationRouter>,
    pub cadence: Arc<dyn Cadence>,
    pub batch_size: usize,
}

/// What one Poll/Evaluate/Notify pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    FetchFailed { consecutive: u32, escalated: bool },
    NoNewItems,
    NewItems { new_ids: Vec<String>, alerted_ids: Vec<String> },
}

#[derive(Clone)]
pub struct SourceMonitor {
    source: Source,
    deps: MonitorDeps,
}

impl SourceMonitor {
    pub fn new(source: Source, deps: MonitorDeps) -> Self {
        Self { source, deps }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Loop forever. Each cycle runs in its own task so a panic inside it
    /// is contained; the monitor then sleeps and tries again.
    pub async fn run(self) {
        tracing::info!(source = %self.source, "monitor started");
        loop {
            let me = self.clone();
            match tokio::spawn(async move { me.run_cycle().await }).await {
                Ok(outcome) => tracing::debug!(source = %self.source, ?outcome, "cycle done"),
                Err(e) => {
                    counter!("watcher_cycle_panics_total", "source" => self.source.to_string())
                        .increment(1);
                    tracing::error!(source = %self.source, error = %e, "monitor cycle aborted");
                }
            }

            let delay = self.deps.cadence.next_delay(Utc::now());
            tracing::info!(source = %self.source, delay_secs = delay.as_secs(), "sleeping until next poll");
            tokio::time::sleep(delay).await;
        }
    }

    /// One Poll → Evaluate → Notify pass, without the sleep.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let src = &self.source;
        counter!("watcher_polls_total", "source" => src.to_string()).increment(1);

        let batch = match self.deps.fetcher.fetch(src, self.deps.batch_size).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(source = %src, error = %format!("{e:#}"), "fetch error");
                Vec::new()
            }
        };

        if batch.is_empty() {
            return self.on_fetch_failure().await;
        }

        if self.deps.failures.record_success(src) {
            tracing::info!(source = %src, "fetching recovered");
        }

        let fresh = self.deps.dedup.claim_unseen(src, &batch);
        if fresh.is_empty() {
            tracing::info!(source = %src, "no new item");
            return CycleOutcome::NoNewItems;
        }
        counter!("watcher_new_items_total", "source" => src.to_string())
            .increment(fresh.len() as u64);

        let mut alerted_ids = Vec::new();
        for item in &fresh {
            if self.notify_if_matching(item).await {
                alerted_ids.push(item.id.clone());
            }
        }

        CycleOutcome::NewItems {
            new_ids: fresh.into_iter().map(|i| i.id).collect(),
            alerted_ids,
        }
    }

    async fn notify_if_matching(&self, item: &Item) -> bool {
        let src = &self.source;
        tracing::info!(source = %src, id = %item.id, text = %preview(&item.text, 60), "new item");

        let matched = self.deps.filter.matched(&item.text);
        if matched.is_empty() {
            tracing::info!(source = %src, id = %item.id, "new item has no keyword, skipped");
            return false;
        }
        counter!("watcher_keyword_hits_total", "source" => src.to_string()).increment(1);

        let msg = AlertMessage::keyword_match(src, &item.text, item.url.as_deref(), &matched);
        self.deps.router.dispatch(&msg).await;
        true
    }

    async fn on_fetch_failure(&self) -> CycleOutcome {
        let src = &self.source;
        counter!("watcher_fetch_failures_total", "source" => src.to_string()).increment(1);

        let rec = self.deps.failures.record_failure(src);
        tracing::warn!(
            source = %src,
            consecutive = rec.count,
            threshold = self.deps.failures.threshold(),
            "fetch failed"
        );

        if rec.just_crossed_threshold {
            counter!("watcher_escalations_total", "source" => src.to_string()).increment(1);
            tracing::error!(source = %src, consecutive = rec.count, "failure threshold reached, escalating");
            let msg = AlertMessage::sustained_failure(src, rec.count);
            self.deps.router.dispatch(&msg).await;
        }

        CycleOutcome::FetchFailed {
            consecutive: rec.count,
            escalated: rec.just_crossed_threshold,
        }
    }
}
