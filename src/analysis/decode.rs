//! Snapshot decoder: one stored payload → flat field → value mapping.
//!
//! Failure is graded. A bad timestamp or unparseable JSON skips the whole
//! row, a payload without inverter data contributes nothing, and a value
//! that does not coerce to a finite number drops only that field.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde_json::Value;

/// Top-level payload key holding the per-inverter measurement lists.
pub const INVERTER_KEY: &str = "inverter";
/// Measurement entry key for the field name.
pub const FIELD_KEY: &str = "fld";
/// Measurement entry key for the raw value.
pub const VALUE_KEY: &str = "val";

static NULL: Value = Value::Null;

// ──────────────────── first-occurrence mapping ────────────────────

/// Insertion-ordered mapping where the first value stored under a name wins.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstWins<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> FirstWins<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Store `value` under `name` unless the name is already present.
    ///
    /// Returns `true` when the value was stored.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: V) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            return false;
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        true
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Names in first-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl<V> Default for FirstWins<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntoIterator for FirstWins<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Decoded numeric fields of one snapshot.
pub type FieldMap = FirstWins<f64>;

// ──────────────────── skip reasons ────────────────────

/// Why a stored row contributed nothing to the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Timestamp missing or not ISO-8601.
    BadTimestamp { raw: String },
    /// Payload missing or not valid JSON.
    BadPayload { details: String },
    /// Valid JSON without an `inverter[0]` measurement list.
    NoInverterData,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadTimestamp { .. } => "bad_timestamp",
            Self::BadPayload { .. } => "bad_payload",
            Self::NoInverterData => "no_inverter_data",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadTimestamp { raw } => write!(f, "unparseable timestamp {raw:?}"),
            Self::BadPayload { details } => write!(f, "unparseable payload: {details}"),
            Self::NoInverterData => f.write_str("no inverter data"),
        }
    }
}

// ──────────────────── decoding ────────────────────

/// Numeric fields of one payload plus the count of fields that failed coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub fields: FieldMap,
    pub dropped_fields: usize,
}

/// A fully decoded stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub timestamp: NaiveDateTime,
    pub fields: FieldMap,
    pub dropped_fields: usize,
}

/// Decode one stored `(timestamp, json)` row.
///
/// `None` for either column is treated like an unparseable value.
pub fn decode_row(
    timestamp: Option<&str>,
    payload: Option<&str>,
) -> std::result::Result<DecodedRow, SkipReason> {
    let raw_ts = timestamp.unwrap_or_default();
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| SkipReason::BadTimestamp {
        raw: raw_ts.to_string(),
    })?;

    let Some(payload) = payload else {
        return Err(SkipReason::BadPayload {
            details: "payload is NULL".to_string(),
        });
    };
    let document = parse_document(payload).map_err(|error| SkipReason::BadPayload {
        details: error.to_string(),
    })?;

    let decoded = decode_payload(&document)?;
    Ok(DecodedRow {
        timestamp,
        fields: decoded.fields,
        dropped_fields: decoded.dropped_fields,
    })
}

/// Parse a payload document, tolerating bare `NaN`, `Infinity` and
/// `-Infinity` value tokens.
///
/// Those tokens become `null`, so the affected field is dropped during
/// coercion instead of the whole document failing. Out-of-range numbers such
/// as `1e400` parse as-is and are rejected later as non-finite.
pub fn parse_document(text: &str) -> serde_json::Result<Value> {
    match serde_json::from_str(text) {
        Ok(document) => Ok(document),
        Err(strict) => match replace_non_finite_tokens(text) {
            Some(cleaned) => serde_json::from_str(&cleaned).map_err(|_| strict),
            None => Err(strict),
        },
    }
}

const NON_FINITE_TOKENS: &[&str] = &["-Infinity", "Infinity", "NaN"];

/// Rewrite non-finite tokens outside string literals to `null`.
/// `None` when there was nothing to rewrite.
fn replace_non_finite_tokens(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut in_string = false;
    let mut escaped = false;
    let mut replaced = false;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = NON_FINITE_TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            replaced = true;
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    replaced.then_some(out)
}

/// Decode an already-parsed payload document.
pub fn decode_payload(document: &Value) -> std::result::Result<DecodedPayload, SkipReason> {
    let entries = measurement_entries(document).ok_or(SkipReason::NoInverterData)?;
    let raw = first_occurrences(entries);

    let mut fields = FieldMap::new();
    let mut dropped_fields = 0;
    for (name, value) in raw {
        match coerce_value(value) {
            Some(number) => {
                fields.insert_if_absent(name, number);
            }
            None => dropped_fields += 1,
        }
    }
    Ok(DecodedPayload {
        fields,
        dropped_fields,
    })
}

/// The measurement list at `inverter[0]`, if the payload has one.
pub fn measurement_entries(document: &Value) -> Option<&[Value]> {
    let inverters = document.get(INVERTER_KEY)?.as_array()?;
    let first = inverters.first()?.as_array()?;
    Some(first.as_slice())
}

/// Raw values keyed by field name, first occurrence wins.
///
/// Duplicates are resolved before coercion, so an unusable first value
/// shadows a later usable one.
pub fn first_occurrences(entries: &[Value]) -> FirstWins<&Value> {
    let mut seen = FirstWins::new();
    for entry in entries {
        let Some(name) = entry.get(FIELD_KEY).and_then(Value::as_str) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let value = entry.get(VALUE_KEY).unwrap_or(&NULL);
        seen.insert_if_absent(name, value);
    }
    seen
}

/// Coerce a raw measurement value into a finite `f64`.
pub fn coerce_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    number.is_finite().then_some(number)
}

// ──────────────────── timestamps ────────────────────

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp.
///
/// Offset-bearing values are normalised to UTC wall time; naive values are
/// returned unchanged. A bare date means midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Some(aware.naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Render a timestamp the way it is persisted: seconds precision, plus
/// microseconds when present.
#[must_use]
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}
