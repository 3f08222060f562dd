//! Forgiving serde decoders for upstream reference and progress data.
//!
//! Task data arrives from several generations of upstream exports. Numbers show
//! up as strings, lists as `null`, entity references as either a bare id or an
//! `{ "id": ... }` object. None of that may abort a load: malformed numbers
//! decode to `0`, missing lists decode to empty, and a list entry that does not
//! fit is dropped on its own.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Convert an arbitrary JSON value into a finite number, defaulting to 0.
pub fn value_to_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(0.0)
}

/// Decode any JSON value as a number. Non-numeric input yields 0.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_to_f64).unwrap_or(0.0))
}

/// Decode a non-negative integer (player level, edition id).
pub fn whole<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = number(deserializer)?;
    if n <= 0.0 {
        Ok(0)
    } else if n >= u32::MAX as f64 {
        Ok(u32::MAX)
    } else {
        Ok(n.floor() as u32)
    }
}

/// Decode a boolean, treating `null`, numbers and strings sensibly.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    })
}

/// Decode a list element by element, dropping entries that do not fit `T`.
pub fn lossy_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(single) => vec![single],
    };
    Ok(raw
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed list entry");
                None
            }
        })
        .collect())
}

/// Decode one string or a list of them. Non-string entries are dropped.
pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Decode optional text. Anything but a string is treated as absent.
pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Decode an RFC 3339 timestamp; unparseable values become `None`.
pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text(deserializer)?
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|t| t.with_timezone(&Utc)))
}

/// Decode a map of numbers keyed by id, coercing every value.
pub fn number_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|(id, value)| (id, value_to_f64(&value)))
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntityRef {
    Id(String),
    Object { id: Option<String> },
    Other(Value),
}

impl EntityRef {
    fn into_id(self) -> Option<String> {
        match self {
            EntityRef::Id(id) => Some(id),
            EntityRef::Object { id } => id,
            EntityRef::Other(_) => None,
        }
    }
}

/// Decode an entity reference given either as `"id"` or `{ "id": "..." }`.
///
/// Empty ids are treated as absent.
pub fn entity_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let reference = Option::<EntityRef>::deserialize(deserializer)?;
    Ok(reference
        .and_then(EntityRef::into_id)
        .filter(|id| !id.trim().is_empty()))
}

/// Decode a required entity reference; unusable references become `""`.
pub fn entity_id_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(entity_id(deserializer)?.unwrap_or_default())
}

/// Decode a list of entity references, dropping unusable entries.
pub fn entity_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<EntityRef>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(EntityRef::into_id)
        .filter(|id| !id.trim().is_empty())
        .collect())
}
