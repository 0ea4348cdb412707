//! Summary report: static fields with their constant value, dynamic fields
//! with descriptive statistics. Renders as plain text or serializes to JSON.

#![allow(missing_docs)]

use std::fmt::Write as _;

use serde::Serialize;

use crate::analysis::classify::Classification;
use crate::analysis::decode::format_timestamp;
use crate::analysis::stats::Summary;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticField {
    pub name: String,
    pub value: f64,
    pub recorded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicField {
    pub name: String,
    #[serde(flatten)]
    pub summary: Summary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub static_fields: Vec<StaticField>,
    pub dynamic_fields: Vec<DynamicField>,
}

impl Report {
    pub fn build(classification: &Classification<'_>) -> Self {
        let static_fields = classification
            .static_fields
            .iter()
            .map(|entry| StaticField {
                name: entry.name.to_string(),
                value: entry.value,
                recorded_at: format_timestamp(&entry.first_seen),
            })
            .collect();

        let dynamic_fields = classification
            .dynamic_fields
            .iter()
            .filter_map(|series| {
                Summary::from_values(&series.values()).map(|summary| DynamicField {
                    name: series.name.clone(),
                    summary,
                })
            })
            .collect();

        Self {
            static_fields,
            dynamic_fields,
        }
    }

    /// Render the plain-text summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if self.static_fields.is_empty() {
            out.push_str("No static curves found.\n");
        } else {
            out.push_str("Static curves (constant values):\n");
            for field in &self.static_fields {
                let _ = writeln!(
                    out,
                    "{}: {} (recorded at {})",
                    field.name,
                    format_constant(field.value),
                    field.recorded_at
                );
            }
        }

        if !self.dynamic_fields.is_empty() {
            out.push_str("\nDescriptive statistics for dynamic curves:\n");
            for field in &self.dynamic_fields {
                let s = &field.summary;
                let _ = write!(
                    out,
                    "\n{}:\n  Count: {}\n  Mean: {:.2}\n  Std Dev: {:.2}\n  Median: {:.2}\n  Min: {:.2}\n  Max: {:.2}\n",
                    field.name, s.count, s.mean, s.std_dev, s.median, s.min, s.max
                );
            }
        }

        out
    }
}

/// Shortest round-trip form: at least one fractional digit in positional
/// notation (`97.0`, `48.3`), scientific with a signed two-digit exponent
/// below 1e-4 and from 1e16 up (`1e-05`, `1.5e+16`).
#[allow(clippy::float_cmp)]
pub fn format_constant(value: f64) -> String {
    if !value.is_finite() {
        return format!("{value}");
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .and_then(|(m, e)| e.parse::<i32>().ok().map(|e| (m, e)))
        .unwrap_or((scientific.as_str(), 0));

    if value != 0.0 && !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    }

    let positional = format!("{value}");
    if positional.contains('.') {
        positional
    } else {
        format!("{positional}.0")
    }
}
