//! Offline analysis pipeline over stored snapshots.
//!
//! Stored rows are decoded, folded into per-field series, split into static
//! and dynamic fields, and summarised. Every stage is pure; only the store
//! loader touches I/O and logs.

#![allow(missing_docs)]

pub mod classify;
pub mod decode;
pub mod report;
pub mod series;
pub mod stats;

#[cfg(test)]
mod test_properties;

use serde::Serialize;

use crate::analysis::classify::Classification;
use crate::analysis::decode::{SkipReason, decode_row};
use crate::analysis::report::Report;
use crate::analysis::series::{SeriesBuilder, SeriesSet};
use crate::store::StoredRecord;

/// Row-level accounting from one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostics {
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub bad_timestamp: usize,
    pub bad_payload: usize,
    pub no_inverter_data: usize,
    /// Individual fields dropped because their value did not coerce.
    pub dropped_fields: usize,
    /// Set when the store opened but reading it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

impl LoadDiagnostics {
    pub fn rows_skipped(&self) -> usize {
        self.bad_timestamp + self.bad_payload + self.no_inverter_data
    }

    fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::BadTimestamp { .. } => self.bad_timestamp += 1,
            SkipReason::BadPayload { .. } => self.bad_payload += 1,
            SkipReason::NoInverterData => self.no_inverter_data += 1,
        }
    }
}

/// Reconstructed series plus how they were obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub series: SeriesSet,
    pub diagnostics: LoadDiagnostics,
}

impl Dataset {
    /// Decode stored rows in the order given.
    pub fn from_records<'r, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'r StoredRecord>,
    {
        let mut builder = SeriesBuilder::new();
        let mut diagnostics = LoadDiagnostics::default();

        for record in records {
            diagnostics.rows_read += 1;
            match decode_row(record.timestamp.as_deref(), record.json_data.as_deref()) {
                Ok(row) => {
                    diagnostics.rows_accepted += 1;
                    diagnostics.dropped_fields += row.dropped_fields;
                    builder.push(row.timestamp, &row.fields);
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::NoInverterData => {
                            tracing::debug!(id = record.id, %reason, "row skipped");
                        }
                        _ => tracing::warn!(id = record.id, %reason, "row skipped"),
                    }
                    diagnostics.record_skip(&reason);
                }
            }
        }

        Self {
            series: builder.finish(),
            diagnostics,
        }
    }

    /// Load everything in `store`.
    ///
    /// A read failure is logged and yields an empty dataset with
    /// `diagnostics.read_error` set, so callers can still render a report.
    #[cfg(feature = "sqlite")]
    pub fn load_from_store(store: &crate::store::SnapshotStore) -> Self {
        match store.records() {
            Ok(records) => {
                let dataset = Self::from_records(&records);
                tracing::info!(
                    path = %store.path().display(),
                    rows = dataset.diagnostics.rows_read,
                    accepted = dataset.diagnostics.rows_accepted,
                    fields = dataset.series.len(),
                    "snapshots loaded"
                );
                dataset
            }
            Err(error) => {
                tracing::error!(
                    path = %store.path().display(),
                    code = error.code(),
                    %error,
                    "reading snapshots failed"
                );
                Self {
                    series: SeriesSet::default(),
                    diagnostics: LoadDiagnostics {
                        read_error: Some(error.to_string()),
                        ..LoadDiagnostics::default()
                    },
                }
            }
        }
    }

    pub fn classify(&self) -> Classification<'_> {
        Classification::of(&self.series)
    }

    pub fn report(&self) -> Report {
        Report::build(&self.classify())
    }
}
