// tests/monitor_cycle.rs
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{deps, item, RecordingNotifier, ScriptedFetcher};
use keyword_watcher::{
    CycleOutcome, Fetcher, FixedCadence, Item, Notifier, Source, SourceMonitor,
};

/// Panics on the first fetch, then serves one matching item.
#[derive(Default)]
struct PanicOnceFetcher {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Fetcher for PanicOnceFetcher {
    async fn fetch(&self, _source: &Source, _max_items: usize) -> Result<Vec<Item>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("parser blew up");
        }
        Ok(vec![item("7", "alpha after restart")])
    }
}

#[tokio::test]
async fn only_unseen_item_is_new_and_alerted_once() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let tg = RecordingNotifier::ok("telegram");
    let d = deps(
        fetcher.clone(),
        vec![tg.clone() as Arc<dyn Notifier>],
        &["airdrop"],
        5,
    );
    let src = Source::from("binance");
    d.dedup.record(&src, ["A"]);

    fetcher.push(
        "binance",
        Some(vec![item("B", "Big AIRDROP today"), item("A", "airdrop recap")]),
    );
    let m = SourceMonitor::new(src.clone(), d.clone());
    let out = m.run_cycle().await;

    assert_eq!(
        out,
        CycleOutcome::NewItems {
            new_ids: vec!["B".into()],
            alerted_ids: vec!["B".into()],
        }
    );
    let texts = tg.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Big AIRDROP today"));
    assert!(!texts[0].contains("recap"));
    assert_eq!(fetcher.calls.lock().unwrap()[0].1, 3);
}

#[tokio::test]
async fn repeated_batch_is_not_reported_again() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let tg = RecordingNotifier::ok("telegram");
    let d = deps(fetcher.clone(), vec![tg.clone() as Arc<dyn Notifier>], &["alpha"], 5);
    let m = SourceMonitor::new(Source::from("a"), d);

    let batch = vec![item("2", "Alpha round two"), item("1", "alpha round one")];
    fetcher.push("a", Some(batch.clone()));
    fetcher.push("a", Some(batch));

    assert!(matches!(m.run_cycle().await, CycleOutcome::NewItems { .. }));
    assert_eq!(m.run_cycle().await, CycleOutcome::NoNewItems);
    assert_eq!(tg.texts().len(), 2);
}

#[tokio::test]
async fn new_item_without_keyword_is_not_dispatched() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let tg = RecordingNotifier::ok("telegram");
    let d = deps(fetcher.clone(), vec![tg.clone() as Arc<dyn Notifier>], &["airdrop"], 5);
    let m = SourceMonitor::new(Source::from("a"), d.clone());

    fetcher.push("a", Some(vec![item("9", "weekly market update")]));
    assert_eq!(
        m.run_cycle().await,
        CycleOutcome::NewItems {
            new_ids: vec!["9".into()],
            alerted_ids: vec![],
        }
    );
    assert!(tg.texts().is_empty());
    // still recorded as seen
    assert!(d.dedup.seen(&Source::from("a")).contains("9"));
}

#[tokio::test]
async fn escalation_fires_once_per_failure_excursion() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let tg = RecordingNotifier::ok("telegram");
    let d = deps(fetcher.clone(), vec![tg.clone() as Arc<dyn Notifier>], &["x"], 3);
    let m = SourceMonitor::new(Source::from("a"), d.clone());

    // errors and empty batches count the same
    fetcher.push("a", None);
    fetcher.push("a", Some(vec![]));
    fetcher.push("a", None);
    fetcher.push("a", None);

    let mut escalations = 0;
    for _ in 0..4 {
        if let CycleOutcome::FetchFailed { escalated: true, .. } = m.run_cycle().await {
            escalations += 1;
        }
    }
    assert_eq!(escalations, 1);
    assert_eq!(tg.texts().len(), 1);
    assert!(tg.texts()[0].contains("fetch failed 3 times"));

    // recovery re-arms the alert
    fetcher.push("a", Some(vec![item("1", "hello")]));
    m.run_cycle().await;
    assert_eq!(d.failures.state(&Source::from("a")).consecutive_failures, 0);
    assert!(!d.failures.state(&Source::from("a")).alert_fired);

    for _ in 0..3 {
        m.run_cycle().await; // script exhausted → empty batches
    }
    assert_eq!(tg.texts().len(), 2);
}

#[tokio::test]
async fn failing_channel_does_not_stop_the_cycle() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let down = RecordingNotifier::failing("webhook");
    let up = RecordingNotifier::ok("telegram");
    let d = deps(
        fetcher.clone(),
        vec![down.clone() as Arc<dyn Notifier>, up.clone() as Arc<dyn Notifier>],
        &["alpha"],
        5,
    );
    let m = SourceMonitor::new(Source::from("a"), d);

    fetcher.push("a", Some(vec![item("1", "alpha one"), item("2", "alpha two")]));
    let out = m.run_cycle().await;

    assert_eq!(
        out,
        CycleOutcome::NewItems {
            new_ids: vec!["1".into(), "2".into()],
            alerted_ids: vec!["1".into(), "2".into()],
        }
    );
    assert_eq!(down.texts().len(), 2);
    assert_eq!(up.texts().len(), 2);
}

#[tokio::test]
async fn panicking_cycle_is_followed_by_another_poll() {
    let fetcher = Arc::new(PanicOnceFetcher::default());
    let tg = RecordingNotifier::ok("telegram");
    let mut d = deps(
        Arc::new(ScriptedFetcher::default()),
        vec![tg.clone() as Arc<dyn Notifier>],
        &["alpha"],
        5,
    );
    d.fetcher = fetcher.clone();
    d.cadence = Arc::new(FixedCadence::new(Duration::from_millis(10)));
    let failures = d.failures.clone();
    let src = Source::from("a");

    let run = tokio::spawn(SourceMonitor::new(src.clone(), d).run());
    for _ in 0..200 {
        if !tg.texts().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    run.abort();

    assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
    let texts = tg.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("alpha after restart"));
    // the panic is not a fetch failure
    assert_eq!(failures.state(&src).consecutive_failures, 0);
}
