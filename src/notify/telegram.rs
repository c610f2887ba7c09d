use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::Notifier;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Bot API `sendMessage` to one chat, plain text.
pub struct TelegramNotifier {
    name: String,
    api_base: String,
    bot_token: String,
    chat_id: String,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        if bot_token.trim().is_empty() || chat_id.trim().is_empty() {
            bail!("telegram channel needs both bot_token and chat_id");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building telegram http client")?;
        Ok(Self {
            name: "telegram".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
            client,
        })
    }

    /// Optional builder for tests/tools
    pub fn with_api_base(mut self, base: String) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            // the request error would echo the token-bearing URL
            .map_err(|e| anyhow!("telegram post: {}", e.without_url()))?;
        let status = resp.status();
        let raw = resp.text().await.context("telegram read body")?;

        let ok = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("ok").and_then(|b| b.as_bool()))
            .unwrap_or(false);
        if status.as_u16() != 200 || !ok {
            bail!("telegram rejected message: {status} {raw}");
        }
        Ok(())
    }
}
