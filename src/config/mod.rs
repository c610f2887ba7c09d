// src/config/mod.rs
pub mod watcher;

pub use watcher::{CadenceConfig, ChannelConfig, DedupConfig, FetchConfig, WatcherConfig};
