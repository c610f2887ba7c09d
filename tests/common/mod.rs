// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use keyword_watcher::{
    DedupPolicy, DedupStore, FailureTracker, FixedCadence, Fetcher, Item, KeywordFilter,
    MonitorDeps, NotificationRouter, Notifier, Source,
};

/// Replays scripted batches per source; `None` in the script means "fetch error".
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<Source, VecDeque<Option<Vec<Item>>>>>,
    pub calls: Mutex<Vec<(Source, usize)>>,
}

impl ScriptedFetcher {
    pub fn push(&self, source: &str, batch: Option<Vec<Item>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(Source::from(source))
            .or_default()
            .push_back(batch);
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, source: &Source, max_items: usize) -> Result<Vec<Item>> {
        self.calls.lock().unwrap().push((source.clone(), max_items));
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(source)
            .and_then(|q| q.pop_front());
        match next {
            Some(Some(items)) => Ok(items),
            Some(None) => Err(anyhow!("scripted failure")),
            None => Ok(Vec::new()),
        }
    }
}

/// Records every text it receives; fails on demand.
pub struct RecordingNotifier {
    name: String,
    fail: bool,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn ok(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: false,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail: true,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(anyhow!("{} is down: 500 internal error", self.name));
        }
        Ok(())
    }
}

pub fn item(id: &str, text: &str) -> Item {
    Item::new(id, text)
}

pub fn deps(
    fetcher: Arc<ScriptedFetcher>,
    channels: Vec<Arc<dyn Notifier>>,
    keywords: &[&str],
    threshold: u32,
) -> MonitorDeps {
    MonitorDeps {
        fetcher,
        dedup: Arc::new(DedupStore::new(DedupPolicy::Replace)),
        failures: Arc::new(FailureTracker::new(threshold)),
        filter: Arc::new(KeywordFilter::new(keywords)),
        router: Arc::new(NotificationRouter::new(channels)),
        cadence: Arc::new(FixedCadence::from_secs(3600)),
        batch_size: 3,
    }
}
