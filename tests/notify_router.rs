// tests/notify_router.rs
mod common;

use std::sync::Arc;

use common::RecordingNotifier;
use keyword_watcher::{AlertMessage, Delivery, NotificationRouter, Notifier, Source};

#[tokio::test]
async fn each_channel_attempted_once_despite_failure() {
    let bad = RecordingNotifier::failing("bad");
    let good = RecordingNotifier::ok("good");
    let router = NotificationRouter::new(vec![
        bad.clone() as Arc<dyn Notifier>,
        good.clone() as Arc<dyn Notifier>,
    ]);

    let msg = AlertMessage::new(Source::from("s"), "hello");
    let out = router.dispatch(&msg).await;

    assert_eq!(
        out,
        vec![
            Delivery { channel: "bad".into(), delivered: false },
            Delivery { channel: "good".into(), delivered: true },
        ]
    );
    assert_eq!(bad.texts(), vec!["hello".to_string()]);
    assert_eq!(good.texts(), vec!["hello".to_string()]);
}

#[tokio::test]
async fn failing_first_or_last_makes_no_difference() {
    let good = RecordingNotifier::ok("good");
    let bad = RecordingNotifier::failing("bad");
    let router = NotificationRouter::new(vec![
        good.clone() as Arc<dyn Notifier>,
        bad.clone() as Arc<dyn Notifier>,
    ]);
    let out = router.dispatch(&AlertMessage::new(Source::from("s"), "x")).await;
    assert_eq!(out.iter().filter(|d| d.delivered).count(), 1);
    assert_eq!(good.texts().len(), 1);
    assert_eq!(bad.texts().len(), 1);
    assert_eq!(router.channel_names(), vec!["good".to_string(), "bad".to_string()]);
}
