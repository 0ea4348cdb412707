//! Live gauge board: configured display slots fed from each polled snapshot.

#![allow(missing_docs)]
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::decode::{coerce_value, first_occurrences, measurement_entries};

/// One gauge: which field it shows and over what range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfig {
    pub field: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: String,
}

impl GaugeConfig {
    fn new(field: &str, min: f64, max: f64, unit: &str) -> Self {
        Self {
            field: field.to_string(),
            min,
            max,
            unit: unit.to_string(),
        }
    }
}

/// The stock AhoyDTU board, in display order.
pub fn default_gauges() -> Vec<GaugeConfig> {
    vec![
        GaugeConfig::new("U_DC", 0.0, 50.0, "V"),
        GaugeConfig::new("I_DC", 0.0, 10.0, "A"),
        GaugeConfig::new("P_DC", 0.0, 700.0, "W"),
        GaugeConfig::new("YieldDay", 0.0, 2000.0, "Wh"),
        GaugeConfig::new("YieldTotal", 0.0, 2000.0, "kWh"),
        GaugeConfig::new("Irradiation", 0.0, 100.0, "%"),
        GaugeConfig::new("U_AC", 0.0, 300.0, "V"),
        GaugeConfig::new("I_AC", 0.0, 10.0, "A"),
        GaugeConfig::new("P_AC", 0.0, 1000.0, "W"),
        GaugeConfig::new("Temp", 0.0, 100.0, "°C"),
        GaugeConfig::new("Efficiency", 0.0, 100.0, "%"),
    ]
}

/// Current state of one gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReading {
    pub field: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    /// Clamped value.
    pub value: f64,
    /// Whether any snapshot has carried this field yet.
    pub seen: bool,
}

impl GaugeReading {
    fn idle(config: &GaugeConfig) -> Self {
        Self {
            field: config.field.clone(),
            unit: config.unit.clone(),
            min: config.min,
            max: config.max,
            value: config.min,
            seen: false,
        }
    }

    /// Set from a raw payload value. Non-numeric input reads as 0.
    pub fn update(&mut self, raw: &Value) {
        let value = coerce_value(raw).unwrap_or(0.0);
        self.value = value.clamp(self.min, self.max);
        self.seen = true;
    }

    /// Integer dial position (truncated toward zero).
    pub fn dial_position(&self) -> i64 {
        self.value.trunc() as i64
    }

    /// `"<value with 2 decimals> <unit>"`.
    pub fn label(&self) -> String {
        format!("{:.2} {}", self.value, self.unit)
    }

    /// Position of the value inside `[min, max]`, in `0.0..=1.0`.
    pub fn fill_fraction(&self) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.value - self.min) / span).clamp(0.0, 1.0)
    }

    /// Text bar of `width` cells.
    pub fn bar(&self, width: usize) -> String {
        let filled = ((self.fill_fraction() * width as f64).round() as usize).min(width);
        format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
    }
}

/// All configured gauges in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeBoard {
    readings: Vec<GaugeReading>,
}

impl GaugeBoard {
    pub fn new(configs: &[GaugeConfig]) -> Self {
        Self {
            readings: configs.iter().map(GaugeReading::idle).collect(),
        }
    }

    /// Update from one live payload; returns how many gauges changed source.
    ///
    /// Each gauge takes the first measurement carrying its field. Gauges
    /// whose field is absent keep their previous reading.
    pub fn apply(&mut self, payload: &Value) -> usize {
        let Some(entries) = measurement_entries(payload) else {
            return 0;
        };
        let raw = first_occurrences(entries);

        let mut updated = 0;
        for reading in &mut self.readings {
            if let Some(value) = raw.get(&reading.field) {
                reading.update(value);
                updated += 1;
            }
        }
        updated
    }

    pub fn readings(&self) -> &[GaugeReading] {
        &self.readings
    }

    pub fn get(&self, field: &str) -> Option<&GaugeReading> {
        self.readings.iter().find(|r| r.field == field)
    }
}
