//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use inverter_tacho::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TachoError};

// Analysis
pub use crate::analysis::classify::Classification;
pub use crate::analysis::decode::{FieldMap, SkipReason, decode_payload, decode_row};
pub use crate::analysis::report::Report;
pub use crate::analysis::series::{FieldSeries, SeriesBuilder, SeriesPoint, SeriesSet};
pub use crate::analysis::stats::{Histogram, Summary};
pub use crate::analysis::{Dataset, LoadDiagnostics};

// Live
pub use crate::live::fetch::LiveClient;
pub use crate::live::gauge::{GaugeBoard, GaugeConfig, GaugeReading};
pub use crate::live::poller::{
    CancellationToken, LiveSnapshot, PollLoop, PollSettings, PollStats, SnapshotSource,
};

// Store
pub use crate::store::StoredRecord;
#[cfg(feature = "sqlite")]
pub use crate::store::SnapshotStore;
