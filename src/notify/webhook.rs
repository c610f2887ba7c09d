use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::Notifier;

/// Payload shape and success rule of the receiving end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFlavor {
    /// WeCom group robot: `{"msgtype":"text",...}`, ok when `errcode == 0`.
    #[default]
    Wecom,
    Slack,
    Discord,
}

impl fmt::Display for WebhookFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WebhookFlavor::Wecom => "wecom",
            WebhookFlavor::Slack => "slack",
            WebhookFlavor::Discord => "discord",
        })
    }
}

#[derive(Serialize)]
struct WecomText<'a> {
    content: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WebhookPayload<'a> {
    Wecom {
        msgtype: &'static str,
        text: WecomText<'a>,
    },
    Slack {
        text: &'a str,
    },
    Discord {
        content: &'a str,
    },
}

impl<'a> WebhookPayload<'a> {
    fn build(flavor: WebhookFlavor, text: &'a str) -> Self {
        match flavor {
            WebhookFlavor::Wecom => Self::Wecom {
                msgtype: "text",
                text: WecomText { content: text },
            },
            WebhookFlavor::Slack => Self::Slack { text },
            WebhookFlavor::Discord => Self::Discord { content: text },
        }
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    name: String,
    url: String,
    flavor: WebhookFlavor,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: String, flavor: WebhookFlavor) -> Result<Self> {
        let url = url.trim().to_string();
        if url.is_empty() {
            bail!("webhook channel needs a url");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building webhook http client")?;
        Ok(Self {
            name: format!("webhook:{flavor}"),
            url,
            flavor,
            client,
        })
    }

    pub fn with_name(mut self, name: String) -> Self {
        self.name = name;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, text: &str) -> Result<()> {
        let payload = WebhookPayload::build(self.flavor, text);
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("webhook post")?;
        let status = resp.status();
        let raw = resp.text().await.context("webhook read body")?;

        let accepted = match self.flavor {
            WebhookFlavor::Wecom => {
                status.as_u16() == 200
                    && serde_json::from_str::<serde_json::Value>(&raw)
                        .ok()
                        .and_then(|v| v.get("errcode").and_then(|c| c.as_i64()))
                        == Some(0)
            }
            WebhookFlavor::Slack | WebhookFlavor::Discord => status.is_success(),
        };
        if !accepted {
            bail!("{} webhook rejected message: {status} {raw}", self.flavor);
        }
        Ok(())
    }
}
