#![forbid(unsafe_code)]

//! inverter_tacho: live monitoring and offline analysis for Ahoy-DTU solar
//! inverters.
//!
//! Two halves share one SQLite file:
//! 1. **Live** polls `/api/record/live`, drives a gauge board, and stores each
//!    raw snapshot as JSON.
//! 2. **Analysis** decodes the stored snapshots into per-field time series,
//!    splits them into static and dynamic fields, and summarises the dynamic
//!    ones.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use inverter_tacho::prelude::*;
//!
//! let store = SnapshotStore::open_existing(std::path::Path::new("ahoydtu.sqlite"))?;
//! let dataset = Dataset::load_from_store(&store);
//! print!("{}", dataset.report().render_text());
//! # Ok::<(), TachoError>(())
//! ```

pub mod prelude;

pub mod analysis;
pub mod core;
pub mod live;
pub mod logging;
pub mod store;
