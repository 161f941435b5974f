// src/sources/extract.rs
//
// Tolerant extraction of candidate records from provider JSON whose shape
// changes without notice. An ordered list of container strategies is tried
// first-match-wins; the recursive scan is the fallback of last resort, so
// correctness of the primary lookup is never assumed.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Keys that mark an object as id-bearing for the recursive scan.
const SCAN_ID_KEYS: &[&str] = &["id", "rest_id", "conversationId"];
/// Keys that mark an object as content-bearing for the recursive scan.
const SCAN_CONTENT_KEYS: &[&str] = &["text", "twitterUrl", "url", "createdAt"];

const ID_KEYS: &[&str] = &["rest_id", "id", "id_str", "conversationId", "tweetId"];
const TEXT_KEYS: &[&str] = &["text", "full_text"];
const URL_KEYS: &[&str] = &["url", "twitterUrl"];
const AUTHOR_OBJECT_KEYS: &[&str] = &["author", "user", "user_extended"];
const AUTHOR_NAME_KEYS: &[&str] = &["userName", "username", "screen_name", "screenName", "handle"];
const AUTHOR_TOP_KEYS: &[&str] = &[
    "author_username",
    "authorUserName",
    "userName",
    "username",
    "screen_name",
];
const CREATED_AT_KEYS: &[&str] = &["createdAt", "created_at"];

/// One way of locating the candidate list inside a provider response.
/// Returns `Some` when this strategy found a candidate list, `None` when the
/// shape does not apply.
pub trait ContainerStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn locate(&self, body: &Value) -> Option<Vec<Value>>;
}

/// Flat list under a known top-level key.
struct KnownListKeys;

impl ContainerStrategy for KnownListKeys {
    fn name(&self) -> &'static str {
        "known-list-keys"
    }

    fn locate(&self, body: &Value) -> Option<Vec<Value>> {
        for key in ["tweets", "data"] {
            if let Some(list) = body.get(key).and_then(Value::as_array) {
                return Some(list.clone());
            }
        }
        None
    }
}

/// `timeline` envelope with the candidate list one level down.
struct TimelineEnvelope;

impl ContainerStrategy for TimelineEnvelope {
    fn name(&self) -> &'static str {
        "timeline-envelope"
    }

    fn locate(&self, body: &Value) -> Option<Vec<Value>> {
        let timeline = body.get("timeline")?;
        for key in ["items", "instructions", "entries"] {
            if let Some(list) = timeline.get(key).and_then(Value::as_array) {
                return Some(list.clone());
            }
        }
        None
    }
}

/// Last resort: collect every nested object exposing both an id-like field
/// and a content-like field, regardless of depth.
struct RecursiveScan;

impl ContainerStrategy for RecursiveScan {
    fn name(&self) -> &'static str {
        "recursive-scan"
    }

    fn locate(&self, body: &Value) -> Option<Vec<Value>> {
        let mut found = Vec::new();
        scan(body, &mut found);
        Some(found)
    }
}

fn looks_like_record(obj: &serde_json::Map<String, Value>) -> bool {
    SCAN_ID_KEYS.iter().any(|k| obj.contains_key(*k))
        && SCAN_CONTENT_KEYS.iter().any(|k| obj.contains_key(*k))
}

fn scan(value: &Value, found: &mut Vec<Value>) {
    match value {
        Value::Object(obj) => {
            if looks_like_record(obj) {
                found.push(value.clone());
            }
            for nested in obj.values() {
                scan(nested, found);
            }
        }
        Value::Array(items) => {
            for nested in items {
                scan(nested, found);
            }
        }
        _ => {}
    }
}

fn default_strategies() -> Vec<Box<dyn ContainerStrategy>> {
    vec![
        Box::new(KnownListKeys),
        Box::new(TimelineEnvelope),
        Box::new(RecursiveScan),
    ]
}

/// Locate candidate records in `body`, trying each strategy in order.
pub fn candidate_records(body: &Value) -> Vec<Value> {
    for strategy in default_strategies() {
        if let Some(records) = strategy.locate(body) {
            tracing::debug!(
                strategy = strategy.name(),
                count = records.len(),
                "located candidate records"
            );
            return records;
        }
    }
    Vec::new()
}

/// Best-effort string coercion: providers emit ids as strings or numbers.
fn stringy(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_stringy(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| record.get(*k).and_then(stringy))
}

/// Resolve the record's stable identifier, falling through to the nested
/// `legacy` payload some providers embed one level down.
pub fn record_id(record: &Value) -> Option<String> {
    first_stringy(record, ID_KEYS).or_else(|| {
        record
            .get("legacy")
            .and_then(|legacy| legacy.get("id_str"))
            .and_then(stringy)
    })
}

pub fn record_text(record: &Value) -> Option<String> {
    first_stringy(record, TEXT_KEYS)
        .or_else(|| {
            record
                .get("legacy")
                .and_then(|legacy| first_stringy(legacy, &["full_text", "text"]))
        })
        .or_else(|| first_stringy(record, &["displayText", "display_text"]))
}

pub fn record_url(record: &Value) -> Option<String> {
    first_stringy(record, URL_KEYS)
}

/// Resolve the author handle, lowercased. Tries author-ish sub-objects,
/// then top-level keys, then the handle segment of a `/status/` URL.
pub fn record_author(record: &Value) -> Option<String> {
    for key in AUTHOR_OBJECT_KEYS {
        if let Some(author) = record.get(*key) {
            if let Some(name) = first_stringy(author, AUTHOR_NAME_KEYS) {
                return Some(name.to_lowercase());
            }
        }
    }
    if let Some(name) = first_stringy(record, AUTHOR_TOP_KEYS) {
        return Some(name.to_lowercase());
    }
    record_url(record)
        .as_deref()
        .and_then(handle_from_status_url)
}

/// "https://x.com/acme/status/42" -> "acme"
fn handle_from_status_url(url: &str) -> Option<String> {
    if !url.contains("/status/") {
        return None;
    }
    let after_scheme = url.split("://").last()?;
    let (_, path) = after_scheme.split_once('/')?;
    let handle = path.split('/').next()?;
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_lowercase())
    }
}

pub fn record_published_at(record: &Value) -> Option<DateTime<Utc>> {
    let raw = first_stringy(record, CREATED_AT_KEYS)?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        // Legacy timeline format: "Tue Jul 01 12:00:00 +0000 2025"
        .or_else(|| DateTime::parse_from_str(&raw, "%a %b %d %H:%M:%S %z %Y").ok())
        .map(|dt| dt.with_timezone(&Utc))
}
