// src/config/watcher.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::cadence::{
    AdaptiveCadence, Cadence, FixedCadence, DEFAULT_INTERVAL_SECS, DEFAULT_UTC_OFFSET_HOURS,
};
use crate::dedup::DedupPolicy;
use crate::failure::DEFAULT_FAILURE_THRESHOLD;
use crate::ingest::Source;
use crate::monitor::DEFAULT_BATCH_SIZE;
use crate::notify::WebhookFlavor;

pub const DEFAULT_CONFIG_PATH: &str = "config/watcher.toml";
pub const ENV_CONFIG_PATH: &str = "WATCHER_CONFIG_PATH";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";

const MAX_BATCH_SIZE: usize = 20;

const TEMPLATE: &str = r#"# keyword-watcher configuration

# Handles to watch, one monitor each.
sources = ["binance"]

# Case-insensitive substrings; a new post matching any of them is alerted.
keywords = ["Alpha", "airdrop"]

# Consecutive failed polls before a one-shot escalation alert.
failure_threshold = 5

# Most recent posts requested per poll.
batch_size = 3

[fetch]
instances = ["https://nitter.net"]
timeout_secs = 30

[cadence]
# "adaptive" (time-of-day) or "fixed"
policy = "adaptive"
interval_secs = 60
utc_offset_hours = 8

[dedup]
# "accumulate" (bounded) or "replace" (latest batch only)
policy = "accumulate"
capacity = 64

# [[channels]]
# kind = "telegram"
# bot_token = "ENV"   # read from TELEGRAM_BOT_TOKEN
# chat_id = ""

# [[channels]]
# kind = "webhook"
# flavor = "wecom"    # wecom | slack | discord
# url = "ENV"         # read from WEBHOOK_URL
"#;

fn default_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}
fn default_dedup_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    pub sources: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub instances: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CadencePolicy {
    Fixed,
    #[default]
    Adaptive,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub policy: CadencePolicy,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            policy: CadencePolicy::default(),
            interval_secs: default_interval_secs(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    #[default]
    Accumulate,
    Replace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default)]
    pub policy: DedupMode,
    #[serde(default = "default_dedup_capacity")]
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            policy: DedupMode::default(),
            capacity: default_dedup_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    Telegram {
        #[serde(default)]
        name: Option<String>,
        bot_token: String,
        chat_id: String,
        #[serde(default)]
        api_base: Option<String>,
    },
    Webhook {
        #[serde(default)]
        name: Option<String>,
        url: String,
        #[serde(default)]
        flavor: WebhookFlavor,
    },
}

impl WatcherConfig {
    /// Load using `$WATCHER_CONFIG_PATH`, falling back to `config/watcher.toml`.
    /// A missing file is replaced by a template and reported as an error.
    pub fn load_default() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        if !path.exists() {
            write_template(&path)?;
            bail!(
                "config file {} not found; a template was written there, fill it in and restart",
                path.display()
            );
        }
        Self::load_from_file(&path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: WatcherConfig = toml::from_str(s).context("parsing watcher config")?;
        cfg.resolve_env()?;
        cfg.sanitize()?;
        Ok(cfg)
    }

    fn resolve_env(&mut self) -> Result<()> {
        for ch in &mut self.channels {
            match ch {
                ChannelConfig::Telegram { bot_token, .. } => {
                    if bot_token.trim().eq_ignore_ascii_case("env") {
                        *bot_token = env::var(ENV_TELEGRAM_BOT_TOKEN)
                            .map_err(|_| anyhow!("Missing {ENV_TELEGRAM_BOT_TOKEN} env var"))?;
                    }
                }
                ChannelConfig::Webhook { url, .. } => {
                    if url.trim().eq_ignore_ascii_case("env") {
                        *url = env::var(ENV_WEBHOOK_URL)
                            .map_err(|_| anyhow!("Missing {ENV_WEBHOOK_URL} env var"))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn sanitize(&mut self) -> Result<()> {
        self.sources = clean_list(std::mem::take(&mut self.sources));
        if self.sources.is_empty() {
            bail!("`sources` must list at least one handle");
        }
        self.keywords = clean_list(std::mem::take(&mut self.keywords));
        if self.keywords.is_empty() {
            tracing::warn!("`keywords` is empty; no post will ever match");
        }

        self.fetch.instances = clean_list(
            std::mem::take(&mut self.fetch.instances)
                .into_iter()
                .map(|i| i.trim().trim_end_matches('/').to_string())
                .collect(),
        );
        if self.fetch.instances.is_empty() {
            bail!("`fetch.instances` must list at least one mirror");
        }
        self.fetch.timeout_secs = self.fetch.timeout_secs.max(1);

        self.failure_threshold = self.failure_threshold.max(1);
        self.batch_size = self.batch_size.clamp(1, MAX_BATCH_SIZE);
        self.cadence.interval_secs = self.cadence.interval_secs.max(1);
        if !(-12..=14).contains(&self.cadence.utc_offset_hours) {
            bail!(
                "`cadence.utc_offset_hours` out of range: {}",
                self.cadence.utc_offset_hours
            );
        }
        // a smaller window would forget ids of the batch just recorded
        self.dedup.capacity = self.dedup.capacity.max(self.batch_size);

        for (i, ch) in self.channels.iter().enumerate() {
            match ch {
                ChannelConfig::Telegram {
                    bot_token, chat_id, ..
                } => {
                    if bot_token.trim().is_empty() || chat_id.trim().is_empty() {
                        bail!("channels[{i}]: telegram needs bot_token and chat_id");
                    }
                }
                ChannelConfig::Webhook { url, .. } => {
                    if url.trim().is_empty() {
                        bail!("channels[{i}]: webhook needs a url");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn sources(&self) -> Vec<Source> {
        self.sources.iter().map(|s| Source::new(s.as_str())).collect()
    }

    pub fn dedup_policy(&self) -> DedupPolicy {
        match self.dedup.policy {
            DedupMode::Replace => DedupPolicy::Replace,
            DedupMode::Accumulate => DedupPolicy::Accumulate {
                capacity: self.dedup.capacity,
            },
        }
    }

    pub fn build_cadence(&self) -> Result<Box<dyn Cadence>> {
        Ok(match self.cadence.policy {
            CadencePolicy::Fixed => Box::new(FixedCadence::from_secs(self.cadence.interval_secs)),
            CadencePolicy::Adaptive => Box::new(
                AdaptiveCadence::from_offset_hours(self.cadence.utc_offset_hours).ok_or_else(
                    || anyhow!("invalid utc offset {}", self.cadence.utc_offset_hours),
                )?,
            ),
        })
    }
}

fn write_template(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, TEMPLATE).with_context(|| format!("writing template {}", path.display()))?;
    tracing::error!(path = %path.display(), "config file missing, template written");
    Ok(())
}

/// Trim, drop empties and duplicates, keep first-seen order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && seen.insert(t.to_string()) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_and_uses_defaults() {
        let cfg = WatcherConfig::from_toml_str(TEMPLATE).unwrap();
        assert_eq!(cfg.sources, vec!["binance".to_string()]);
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.cadence.policy, CadencePolicy::Adaptive);
        assert!(cfg.channels.is_empty());
    }

    #[test]
    fn lists_are_trimmed_and_deduped_in_order() {
        assert_eq!(
            clean_list(vec![" b ".into(), "".into(), "a".into(), "b".into()]),
            vec!["b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn clamps_and_capacity_floor() {
        let cfg = WatcherConfig::from_toml_str(
            r#"
sources = ["a"]
failure_threshold = 0
batch_size = 99
[fetch]
instances = ["https://n.example/"]
[dedup]
capacity = 2
"#,
        )
        .unwrap();
        assert_eq!(cfg.failure_threshold, 1);
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.dedup.capacity, 20);
        assert_eq!(cfg.fetch.instances, vec!["https://n.example".to_string()]);
    }

    #[test]
    fn missing_sources_or_instances_fail() {
        let no_sources = "sources = []\n[fetch]\ninstances = [\"https://n\"]\n";
        assert!(WatcherConfig::from_toml_str(no_sources).is_err());
        let no_instances = "sources = [\"a\"]\n[fetch]\ninstances = [\" \"]\n";
        assert!(WatcherConfig::from_toml_str(no_instances).is_err());
    }
}
