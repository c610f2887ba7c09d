// src/notify/mod.rs
pub mod telegram;
pub mod webhook;

use anyhow::Result;
use metrics::counter;
use std::sync::Arc;

use crate::config::watcher::ChannelConfig;
use crate::ingest::Source;

pub use telegram::TelegramNotifier;
pub use webhook::{WebhookFlavor, WebhookNotifier};

/// Fire-and-forget text concerning one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub source: Source,
    pub text: String,
}

impl AlertMessage {
    pub fn new(source: Source, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }

    pub fn keyword_match(source: &Source, text: &str, url: Option<&str>, matched: &[&str]) -> Self {
        let mut body = format!("[{source}] keyword match ({}):\n\n{text}", matched.join(", "));
        if let Some(url) = url {
            body.push_str("\n\n");
            body.push_str(url);
        }
        Self::new(source.clone(), body)
    }

    pub fn sustained_failure(source: &Source, consecutive: u32) -> Self {
        Self::new(
            source.clone(),
            format!(
                "[{source}] fetch failed {consecutive} times in a row; no new items can be checked until a mirror recovers."
            ),
        )
    }
}

/// A delivery destination. `Err` carries the raw failure detail for the log.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, text: &str) -> Result<()>;
}

/// Per-channel result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: String,
    pub delivered: bool,
}

/// Fans a message out to every channel. Never fails; no retries.
#[derive(Clone, Default)]
pub struct NotificationRouter {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotificationRouter {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn from_config(cfg: &[ChannelConfig]) -> Result<Self> {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::with_capacity(cfg.len());
        for c in cfg {
            let ch: Arc<dyn Notifier> = match c {
                ChannelConfig::Telegram {
                    name,
                    bot_token,
                    chat_id,
                    api_base,
                } => {
                    let mut t = TelegramNotifier::new(bot_token.clone(), chat_id.clone())?;
                    if let Some(base) = api_base {
                        t = t.with_api_base(base.clone());
                    }
                    if let Some(name) = name {
                        t = t.with_name(name.clone());
                    }
                    Arc::new(t)
                }
                ChannelConfig::Webhook { name, url, flavor } => Arc::new(
                    WebhookNotifier::new(url.clone(), *flavor)?
                        .with_name(name.clone().unwrap_or_else(|| format!("webhook:{flavor}"))),
                ),
            };
            channels.push(ch);
        }
        if channels.is_empty() {
            tracing::warn!("no notification channels configured; matches will only be logged");
        }
        Ok(Self::new(channels))
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Attempt every channel once, in configured order, regardless of earlier failures.
    pub async fn dispatch(&self, msg: &AlertMessage) -> Vec<Delivery> {
        if self.channels.is_empty() {
            tracing::debug!(source = %msg.source, "no channels, alert not sent");
            return Vec::new();
        }

        let mut out = Vec::with_capacity(self.channels.len());
        for ch in &self.channels {
            let channel = ch.name().to_string();
            let delivered = match ch.send(&msg.text).await {
                Ok(()) => {
                    tracing::info!(source = %msg.source, channel = %channel, "notification sent");
                    counter!("watcher_notifications_total", "channel" => channel.clone(), "outcome" => "ok")
                        .increment(1);
                    true
                }
                Err(e) => {
                    tracing::error!(source = %msg.source, channel = %channel, error = %format!("{e:#}"), "notification failed");
                    counter!("watcher_notifications_total", "channel" => channel.clone(), "outcome" => "error")
                        .increment(1);
                    false
                }
            };
            out.push(Delivery { channel, delivered });
        }
        out
    }
}
