// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod cadence;
pub mod config;
pub mod dedup;
pub mod failure;
pub mod filter;
pub mod ingest;
pub mod monitor;
pub mod notify;
pub mod supervisor;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::cadence::{AdaptiveCadence, Cadence, FixedCadence};
pub use crate::config::WatcherConfig;
pub use crate::dedup::{DedupPolicy, DedupStore};
pub use crate::failure::{FailureRecord, FailureTracker};
pub use crate::filter::KeywordFilter;
pub use crate::ingest::{Fetcher, Item, Source};
pub use crate::monitor::{CycleOutcome, MonitorDeps, SourceMonitor};
pub use crate::notify::{AlertMessage, Delivery, NotificationRouter, Notifier};
pub use crate::supervisor::Supervisor;
