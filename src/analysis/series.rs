//! Series builder: fold decoded snapshots into per-field time series.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::analysis::decode::{FieldMap, format_timestamp};

/// One `(timestamp, value)` sample of a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Chronologically ordered samples of one measurement name. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSeries {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

impl FieldSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values in timestamp order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Earliest sample.
    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }
}

/// All reconstructed series keyed (and ordered) by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesSet {
    series: BTreeMap<String, FieldSeries>,
}

impl SeriesSet {
    pub fn get(&self, name: &str) -> Option<&FieldSeries> {
        self.series.get(name)
    }

    /// Series in lexicographic field-name order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSeries> {
        self.series.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Sum of points across every series.
    pub fn total_points(&self) -> usize {
        self.series.values().map(FieldSeries::len).sum()
    }
}

/// Accumulates decoded rows; `finish` sorts and freezes the result.
#[derive(Debug, Default)]
pub struct SeriesBuilder {
    pending: BTreeMap<String, Vec<SeriesPoint>>,
    rows: usize,
}

impl SeriesBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every field of one decoded row.
    pub fn push(&mut self, timestamp: NaiveDateTime, fields: &FieldMap) {
        self.rows += 1;
        for (name, &value) in fields.iter() {
            let point = SeriesPoint { timestamp, value };
            match self.pending.get_mut(name) {
                Some(points) => points.push(point),
                None => {
                    self.pending.insert(name.to_string(), vec![point]);
                }
            }
        }
    }

    /// Rows pushed so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Stable-sort every series by timestamp.
    ///
    /// Input order is not trusted; equal timestamps keep their push order.
    #[must_use]
    pub fn finish(self) -> SeriesSet {
        let series = self
            .pending
            .into_iter()
            .map(|(name, mut points)| {
                points.sort_by_key(|p| p.timestamp);
                (name.clone(), FieldSeries { name, points })
            })
            .collect();
        SeriesSet { series }
    }
}

fn serialize_timestamp<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}
