//! Static/dynamic classification of reconstructed series.

#![allow(missing_docs)]

use chrono::NaiveDateTime;

use crate::analysis::series::{FieldSeries, SeriesPoint, SeriesSet};

/// A series whose recorded values never change.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticEntry<'a> {
    pub name: &'a str,
    pub value: f64,
    /// Timestamp of the earliest sample.
    pub first_seen: NaiveDateTime,
}

/// Partition of a [`SeriesSet`], both sides lexicographic by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification<'a> {
    pub static_fields: Vec<StaticEntry<'a>>,
    pub dynamic_fields: Vec<&'a FieldSeries>,
}

impl<'a> Classification<'a> {
    pub fn of(set: &'a SeriesSet) -> Self {
        let mut out = Self::default();
        for series in set.iter() {
            match constant_value(series) {
                Some(first) => out.static_fields.push(StaticEntry {
                    name: &series.name,
                    value: first.value,
                    first_seen: first.timestamp,
                }),
                None => out.dynamic_fields.push(series),
            }
        }
        out
    }

    /// The first `limit` dynamic fields, in name order; what the plot matrix shows.
    pub fn plot_fields(&self, limit: usize) -> impl Iterator<Item = &'a FieldSeries> + '_ {
        self.dynamic_fields.iter().copied().take(limit)
    }

    pub fn is_static(&self, name: &str) -> bool {
        self.static_fields.iter().any(|e| e.name == name)
    }

    pub fn is_dynamic(&self, name: &str) -> bool {
        self.dynamic_fields.iter().any(|s| s.name == name)
    }
}

/// First point if every value equals it.
#[allow(clippy::float_cmp)]
fn constant_value(series: &FieldSeries) -> Option<&SeriesPoint> {
    let first = series.first()?;
    series
        .points
        .iter()
        .all(|p| p.value == first.value)
        .then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::decode::{FieldMap, parse_timestamp};
    use crate::analysis::series::SeriesBuilder;

    fn build(rows: &[(&str, &[(&str, f64)])]) -> SeriesSet {
        let mut builder = SeriesBuilder::new();
        for (ts, pairs) in rows {
            let mut map = FieldMap::new();
            for (name, value) in *pairs {
                map.insert_if_absent(*name, *value);
            }
            builder.push(parse_timestamp(ts).unwrap(), &map);
        }
        builder.finish()
    }

    #[test]
    fn constant_series_is_static_with_earliest_timestamp() {
        let set = build(&[
            ("2024-01-01T00:00:04", &[("Efficiency", 97.0)]),
            ("2024-01-01T00:00:00", &[("Efficiency", 97.0)]),
            ("2024-01-01T00:00:02", &[("Efficiency", 97.0)]),
        ]);
        let c = Classification::of(&set);
        assert_eq!(c.static_fields.len(), 1);
        assert!(c.dynamic_fields.is_empty());
        let entry = &c.static_fields[0];
        assert_eq!(entry.name, "Efficiency");
        assert_eq!(entry.value, 97.0);
        assert_eq!(
            entry.first_seen,
            parse_timestamp("2024-01-01T00:00:00").unwrap()
        );
    }

    #[test]
    fn single_sample_is_static() {
        let set = build(&[("2024-01-01T00:00:00", &[("Temp", 21.5)])]);
        let c = Classification::of(&set);
        assert!(c.is_static("Temp"));
        assert!(!c.is_dynamic("Temp"));
    }

    #[test]
    fn two_distinct_values_are_dynamic() {
        let set = build(&[
            ("2024-01-01T00:00:00", &[("U_DC", 48.3), ("P_AC", 0.0)]),
            ("2024-01-01T00:00:05", &[("U_DC", 49.1), ("P_AC", 0.0)]),
        ]);
        let c = Classification::of(&set);
        assert!(c.is_dynamic("U_DC"));
        assert!(c.is_static("P_AC"));
    }

    #[test]
    fn outputs_are_lexicographic() {
        let set = build(&[
            ("2024-01-01T00:00:00", &[("Z", 1.0), ("A", 1.0), ("M", 1.0), ("B", 5.0)]),
            ("2024-01-01T00:00:01", &[("Z", 2.0), ("A", 2.0), ("M", 1.0), ("B", 5.0)]),
        ]);
        let c = Classification::of(&set);
        let dynamic: Vec<&str> = c.dynamic_fields.iter().map(|s| s.name.as_str()).collect();
        let fixed: Vec<&str> = c.static_fields.iter().map(|e| e.name).collect();
        assert_eq!(dynamic, vec!["A", "Z"]);
        assert_eq!(fixed, vec!["B", "M"]);
    }

    #[test]
    fn plot_fields_take_first_dynamic_names() {
        let names: Vec<String> = (0..12).map(|i| format!("F{i:02}")).collect();
        let first: Vec<(&str, f64)> = names.iter().map(|n| (n.as_str(), 0.0)).collect();
        let second: Vec<(&str, f64)> = names.iter().map(|n| (n.as_str(), 1.0)).collect();
        let set = build(&[
            ("2024-01-01T00:00:00", first.as_slice()),
            ("2024-01-01T00:00:01", second.as_slice()),
        ]);
        let c = Classification::of(&set);
        let plotted: Vec<&str> = c.plot_fields(9).map(|s| s.name.as_str()).collect();
        assert_eq!(plotted.len(), 9);
        assert_eq!(plotted.first(), Some(&"F00"));
        assert_eq!(plotted.last(), Some(&"F08"));
    }

    #[test]
    fn empty_set_classifies_to_nothing() {
        let set = SeriesSet::default();
        let c = Classification::of(&set);
        assert!(c.static_fields.is_empty());
        assert!(c.dynamic_fields.is_empty());
    }
}
