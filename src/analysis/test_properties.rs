//! Property tests for the decode → series → classify → stats pipeline.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use serde_json::{Value, json};

use super::classify::Classification;
use super::decode::{FieldMap, decode_payload};
use super::series::SeriesBuilder;
use super::stats::{Histogram, Summary};

// ──────────────────── strategies ────────────────────

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .unwrap()
}

fn arb_field_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "U_DC", "I_DC", "P_DC", "YieldDay", "U_AC", "P_AC", "Temp", "Efficiency",
    ])
    .prop_map(str::to_string)
}

fn arb_raw_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1.0e6f64..1.0e6).prop_map(|v| json!(v)),
        (-1.0e6f64..1.0e6).prop_map(|v| json!(v.to_string())),
        (0i64..5000).prop_map(|v| json!(v)),
        Just(json!("N/A")),
        Just(json!("")),
        Just(Value::Null),
    ]
}

fn arb_payload() -> impl Strategy<Value = Value> {
    prop::collection::vec((arb_field_name(), arb_raw_value()), 0..12).prop_map(|entries| {
        let measurements: Vec<Value> = entries
            .into_iter()
            .map(|(fld, val)| json!({"fld": fld, "val": val, "unit": "x"}))
            .collect();
        json!({ "inverter": [measurements] })
    })
}

/// Any finite `f64`, both signs, from subnormal up to `f64::MAX`.
fn arb_finite() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
}

/// Rows as (seconds offset, fields). Offsets repeat and arrive unordered.
fn arb_rows() -> impl Strategy<Value = Vec<(i64, Vec<(String, f64)>)>> {
    prop::collection::vec(
        (
            0i64..600,
            prop::collection::vec((arb_field_name(), -500.0f64..500.0), 0..6),
        ),
        0..40,
    )
}

fn field_map(pairs: &[(String, f64)]) -> FieldMap {
    let mut map = FieldMap::new();
    for (name, value) in pairs {
        map.insert_if_absent(name.as_str(), *value);
    }
    map
}

fn payload_from_fields(fields: &FieldMap) -> Value {
    let measurements: Vec<Value> = fields
        .iter()
        .map(|(name, value)| json!({"fld": name, "val": value}))
        .collect();
    json!({ "inverter": [measurements] })
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn decoding_is_deterministic(payload in arb_payload()) {
        prop_assert_eq!(decode_payload(&payload), decode_payload(&payload));
    }

    #[test]
    fn decoding_decoded_fields_is_identity(payload in arb_payload()) {
        if let Some(first) = decode_payload(&payload).ok().filter(|d| !d.fields.is_empty()) {
            let second = decode_payload(&payload_from_fields(&first.fields)).unwrap();
            prop_assert_eq!(second.dropped_fields, 0);
            prop_assert_eq!(&second.fields, &first.fields);
        }
    }

    #[test]
    fn decoded_values_are_finite_and_unique(payload in arb_payload()) {
        if let Ok(decoded) = decode_payload(&payload) {
            let names: Vec<&str> = decoded.fields.names().collect();
            let mut deduped = names.clone();
            deduped.sort_unstable();
            deduped.dedup();
            prop_assert_eq!(names.len(), deduped.len());
            prop_assert!(decoded.fields.iter().all(|(_, v)| v.is_finite()));
        }
    }

    #[test]
    fn series_sorted_and_point_count_preserved(rows in arb_rows()) {
        let mut builder = SeriesBuilder::new();
        let mut expected_points = 0;
        for (offset, pairs) in &rows {
            let map = field_map(pairs);
            expected_points += map.len();
            builder.push(base_time() + Duration::seconds(*offset), &map);
        }
        let set = builder.finish();

        prop_assert_eq!(set.total_points(), expected_points);
        for series in set.iter() {
            prop_assert!(!series.is_empty());
            prop_assert!(series.points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }
        let names: Vec<&str> = set.names().collect();
        prop_assert!(names.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn classification_partitions_every_series(rows in arb_rows()) {
        let mut builder = SeriesBuilder::new();
        for (offset, pairs) in &rows {
            builder.push(base_time() + Duration::seconds(*offset), &field_map(pairs));
        }
        let set = builder.finish();
        let c = Classification::of(&set);

        prop_assert_eq!(c.static_fields.len() + c.dynamic_fields.len(), set.len());
        for series in &c.dynamic_fields {
            let first = series.points[0].value;
            prop_assert!(series.points.iter().any(|p| p.value != first));
        }
    }

    #[test]
    fn repeated_value_is_static(value in -1.0e6f64..1.0e6, n in 1usize..30) {
        let mut builder = SeriesBuilder::new();
        for i in 0..n {
            let offset = i64::try_from(i).unwrap();
            builder.push(base_time() + Duration::seconds(offset), &field_map(&[("Efficiency".to_string(), value)]));
        }
        let set = builder.finish();
        let c = Classification::of(&set);
        prop_assert_eq!(c.static_fields.len(), 1);
        prop_assert_eq!(c.static_fields[0].value, value);
        prop_assert_eq!(c.static_fields[0].first_seen, base_time());
    }

    #[test]
    fn two_distinct_values_are_dynamic(a in -1.0e3f64..1.0e3, delta in 0.001f64..100.0) {
        let mut builder = SeriesBuilder::new();
        builder.push(base_time(), &field_map(&[("U_DC".to_string(), a)]));
        builder.push(base_time() + Duration::seconds(5), &field_map(&[("U_DC".to_string(), a + delta)]));
        let set = builder.finish();
        prop_assert!(Classification::of(&set).is_dynamic("U_DC"));
    }

    #[test]
    fn single_point_summary(value in -1.0e9f64..1.0e9) {
        let s = Summary::from_values(&[value]).unwrap();
        prop_assert_eq!(s.count, 1);
        prop_assert_eq!(s.std_dev, 0.0);
        prop_assert_eq!(s.mean, value);
        prop_assert_eq!(s.median, value);
        prop_assert_eq!(s.min, value);
        prop_assert_eq!(s.max, value);
    }

    #[test]
    fn summary_is_bounded(values in prop::collection::vec(-1.0e6f64..1.0e6, 1..200)) {
        let s = Summary::from_values(&values).unwrap();
        let tolerance = 1e-6 * (1.0 + s.max.abs().max(s.min.abs()));
        prop_assert_eq!(s.count, values.len());
        prop_assert!(s.min <= s.median && s.median <= s.max);
        prop_assert!(s.mean >= s.min - tolerance && s.mean <= s.max + tolerance);
        prop_assert!(s.std_dev >= 0.0);
    }

    #[test]
    fn summary_finite_over_full_range(values in prop::collection::vec(arb_finite(), 1..100)) {
        let s = Summary::from_values(&values).unwrap();
        prop_assert!(s.mean.is_finite(), "mean {}", s.mean);
        prop_assert!(s.median.is_finite(), "median {}", s.median);
        prop_assert!(s.std_dev.is_finite() && s.std_dev >= 0.0, "std {}", s.std_dev);
        prop_assert!(s.min <= s.mean && s.mean <= s.max);
        prop_assert!(s.min <= s.median && s.median <= s.max);
    }

    #[test]
    fn histogram_counts_every_value(
        values in prop::collection::vec(-1.0e4f64..1.0e4, 1..200),
        bins in 1usize..40,
    ) {
        let h = Histogram::compute(&values, bins).unwrap();
        prop_assert_eq!(h.bins.len(), bins);
        prop_assert_eq!(h.total(), values.len());
        prop_assert!(h.bins.windows(2).all(|w| w[0].lower < w[1].lower));
    }
}
