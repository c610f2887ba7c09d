//! Sends one test message through every configured channel and prints the outcome.

use keyword_watcher::{AlertMessage, NotificationRouter, Source, WatcherConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = WatcherConfig::load_default()?;
    let router = NotificationRouter::from_config(&cfg.channels)?;
    if router.is_empty() {
        println!("no channels configured");
        return Ok(());
    }

    let source = cfg
        .sources()
        .into_iter()
        .next()
        .unwrap_or_else(|| Source::new("test"));
    let msg = AlertMessage::new(
        source.clone(),
        format!("[{source}] notification check from keyword-watcher"),
    );

    let mut failed = 0;
    for d in router.dispatch(&msg).await {
        println!("{:<24} {}", d.channel, if d.delivered { "ok" } else { "FAILED" });
        if !d.delivered {
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} channel(s) failed");
    }
    Ok(())
}
