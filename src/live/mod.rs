//! Live side: poll the DTU, drive the gauge board, persist snapshots.

pub mod fetch;
pub mod gauge;
pub mod poller;
#[cfg(feature = "sqlite")]
pub mod session;
#[cfg(feature = "daemon")]
pub mod signals;
