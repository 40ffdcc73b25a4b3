//! CLI command implementations

pub mod completions;
pub mod config;
pub mod entity;
pub mod io;
pub mod query;
pub mod relationship;
pub mod schema;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use schemagraph_core::Metadata;

/// Parse `key=value`; the value is read as JSON when it parses, else as a string
pub fn parse_field(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Parse an RFC 3339 timestamp, a `YYYY-MM-DD` date (midnight UTC) or `now`
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if s.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}' (use RFC 3339 or YYYY-MM-DD)", s))
}

/// Collect `--field` pairs into metadata, later keys overriding earlier ones
pub fn fields_to_metadata(fields: &[(String, Value)]) -> Metadata {
    let mut metadata = Metadata::new();
    for (key, value) in fields {
        metadata.insert(key.clone(), value.clone());
    }
    metadata
}

/// Split a comma-separated list, dropping empty items
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
