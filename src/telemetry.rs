// src/telemetry.rs
//! Tracing subscriber and optional Prometheus exporter.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "LOG_FILE";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

const DEFAULT_FILTER: &str = "keyword_watcher=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. `LOG_FILE=path` also appends
/// plain-text lines to that file.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let log_path = std::env::var(ENV_LOG_FILE).ok().filter(|p| !p.trim().is_empty());
    let (appender, file_err) = match log_path.as_deref().map(file_appender) {
        Some(Ok(a)) => (Some(a), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };
    let file_layer = appender.map(|a| fmt::layer().with_ansi(false).with_writer(a));

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    if let Some(e) = file_err {
        tracing::warn!(error = %format!("{e:#}"), "file logging disabled");
    } else if let Some(path) = log_path {
        tracing::info!(%path, "logging to file");
    }
}

/// Split `path` into the directory and file name the appender wants.
fn split_log_path(path: &str) -> Result<(PathBuf, String)> {
    let p = Path::new(path.trim());
    let name = p
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{ENV_LOG_FILE}={path} has no file name"))?;
    let dir = match p.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name.to_string()))
}

/// Non-rotating appender that writes to exactly `path`.
pub fn file_appender(path: &str) -> Result<RollingFileAppender> {
    let (dir, name) = split_log_path(path)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir)
        .with_context(|| format!("open log file {path}"))
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("watcher_polls_total", "Polls attempted per source.");
        describe_counter!(
            "watcher_fetch_failures_total",
            "Polls that returned no items or an error."
        );
        describe_counter!("watcher_new_items_total", "Items not seen before.");
        describe_counter!(
            "watcher_keyword_hits_total",
            "New items matching at least one keyword."
        );
        describe_counter!(
            "watcher_escalations_total",
            "Sustained-failure alerts fired."
        );
        describe_counter!(
            "watcher_notifications_total",
            "Channel deliveries by outcome."
        );
        describe_counter!(
            "watcher_cycle_panics_total",
            "Poll cycles aborted by a panic."
        );
        describe_gauge!("watcher_monitors", "Source monitors running.");
    });
}

/// Install the Prometheus recorder with its HTTP listener when `METRICS_ADDR` is set.
/// Returns the bound address, if any.
pub fn init_metrics_from_env() -> Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .trim()
        .parse()
        .with_context(|| format!("{ENV_METRICS_ADDR}={raw} is not a socket address"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_metrics_described();
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(Some(addr))
}
