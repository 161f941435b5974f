// src/sources/mod.rs
pub mod extract;
pub mod page;
pub mod timeline;
pub mod types;

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{SourceDescriptor, SourceKind};
use types::SourceAdapter;

/// Fallback cool-down when a 429 carries no usable Retry-After signal.
pub const DEFAULT_COOL_DOWN: Duration = Duration::from_secs(900);

/// Build the adapter for one descriptor. Fails fast on unusable descriptors
/// (bad URL, bad selector) so misconfiguration is a startup error, not a
/// per-cycle one.
pub fn adapter_for(
    descriptor: &SourceDescriptor,
    api_key: &str,
    api_base_url: &str,
    debug_sink: Option<DebugSink>,
) -> Result<Box<dyn SourceAdapter>> {
    match descriptor.kind {
        SourceKind::UserTimeline | SourceKind::ApiStream => Ok(Box::new(
            timeline::TimelineAdapter::new(descriptor, api_key, api_base_url, debug_sink)?,
        )),
        SourceKind::PageScrape => Ok(Box::new(page::PageAdapter::new(descriptor)?)),
    }
}

/// Parse a Retry-After style header into a duration. Providers send either
/// integral or fractional seconds; anything else is ignored.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = raw.trim().parse().ok()?;
    if secs.is_finite() && (0.0..=31_536_000.0).contains(&secs) {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Normalize a title before relaying: decode HTML entities, strip tags,
/// collapse whitespace, cap the length.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    if out.chars().count() > 300 {
        out = out.chars().take(300).collect();
    }

    out
}

/// Optional sink for raw provider responses that failed to parse. Purely
/// diagnostic; write failures are logged and ignored.
#[derive(Debug, Clone)]
pub struct DebugSink {
    dir: PathBuf,
}

impl DebugSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, name: &str, contents: &str) {
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '-' })
            .collect();
        let path = self.dir.join(format!("debug-{safe}"));
        if let Err(e) = std::fs::write(&path, contents) {
            tracing::debug!(error = %e, path = %path.display(), "debug sink write failed");
        }
    }
}
