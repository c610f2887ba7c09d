// src/ingest/mod.rs
pub mod providers;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

pub use types::{Fetcher, Item, Source};

const MAX_TEXT_CHARS: usize = 4000;

/// Normalize post text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) Tags first, so that escaped angle brackets in the text survive as literals
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)<br\s*/?>|</?p>").expect("static regex"));
    let out = re_tags.replace_all(s, " ");
    static RE_OTHER_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_other = RE_OTHER_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("static regex"));
    let out = re_other.replace_all(&out, "");

    // 2) HTML entity decode (&amp;, &nbsp;, numeric refs)
    let out = html_escape::decode_html_entities(&out).replace('\u{00A0}', " ");

    // 3) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    let out = re_ws.replace_all(&out, " ");
    let out = out.trim();

    // 4) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out.chars().take(MAX_TEXT_CHARS).collect()
    } else {
        out.to_string()
    }
}

/// First `max` chars of `s`, with an ellipsis when cut. Used for log lines.
pub fn preview(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push('…');
    out
}
