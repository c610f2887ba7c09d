//! dedup.rs — in-memory seen-set per source, shared by all monitors.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ingest::{Item, Source};

/// How a source's seen-set changes when new items show up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Seen-set becomes exactly the ids of the latest batch.
    Replace,
    /// Union-in batch ids, dropping the least recently fetched beyond `capacity`.
    Accumulate { capacity: usize },
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::Accumulate { capacity: 64 }
    }
}

#[derive(Debug, Default)]
struct SeenSet {
    ids: HashSet<String>,
    order: VecDeque<String>, // last fetched, oldest first
}

impl SeenSet {
    fn insert(&mut self, id: &str) {
        if self.ids.insert(id.to_string()) {
            self.order.push_back(id.to_string());
        }
    }

    /// Insert `id`, or move it to the back if it is already held.
    fn touch(&mut self, id: &str) {
        if self.ids.contains(id) {
            if let Some(pos) = self.order.iter().position(|o| o == id) {
                if let Some(old) = self.order.remove(pos) {
                    self.order.push_back(old);
                }
            }
        } else {
            self.insert(id);
        }
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.order.clear();
    }

    fn trim_to(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
    }
}

/// Mutex-guarded map Source → seen ids. The map itself is never exposed.
#[derive(Debug)]
pub struct DedupStore {
    inner: Mutex<HashMap<Source, SeenSet>>,
    policy: DedupPolicy,
}

impl DedupStore {
    pub fn new(policy: DedupPolicy) -> Self {
        let policy = match policy {
            DedupPolicy::Accumulate { capacity } => DedupPolicy::Accumulate {
                capacity: capacity.max(1),
            },
            p => p,
        };
        Self {
            inner: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Source, SeenSet>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the ids currently retained for `source`.
    pub fn seen(&self, source: &Source) -> HashSet<String> {
        self.lock()
            .get(source)
            .map(|s| s.ids.clone())
            .unwrap_or_default()
    }

    /// Apply the policy for a batch of ids.
    pub fn record<I, S>(&self, source: &Source, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = self.lock();
        let set = map.entry(source.clone()).or_default();
        Self::apply(self.policy, set, ids);
    }

    /// Return the items of `batch` not yet seen for `source` and, if there are
    /// any, record the whole batch before the lock is released.
    pub fn claim_unseen(&self, source: &Source, batch: &[Item]) -> Vec<Item> {
        let mut map = self.lock();
        let set = map.entry(source.clone()).or_default();

        let mut fresh: Vec<Item> = Vec::new();
        for item in batch {
            let dup_in_batch = fresh.iter().any(|f| f.id == item.id);
            if !set.ids.contains(&item.id) && !dup_in_batch {
                fresh.push(item.clone());
            }
        }
        if !fresh.is_empty() {
            Self::apply(self.policy, set, batch.iter().map(|i| i.id.as_str()));
        }
        fresh
    }

    fn apply<I, S>(policy: DedupPolicy, set: &mut SeenSet, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match policy {
            DedupPolicy::Replace => {
                set.clear();
                for id in ids {
                    set.insert(id.as_ref());
                }
            }
            DedupPolicy::Accumulate { capacity } => {
                let mut batch = HashSet::new();
                for id in ids {
                    set.touch(id.as_ref());
                    batch.insert(id.as_ref().to_string());
                }
                // ids of the batch just recorded are never evicted
                set.trim_to(capacity.max(batch.len()));
            }
        }
    }
}

impl Default for DedupStore {
    fn default() -> Self {
        Self::new(DedupPolicy::default())
    }
}
