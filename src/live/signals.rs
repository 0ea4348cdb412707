//! Signal handling: SIGINT/SIGTERM cancel the poll loop.
//!
//! Uses `signal-hook` flag registration; the loop polls the flag each
//! iteration rather than blocking on signals.

#![allow(missing_docs)]

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::live::poller::CancellationToken;

/// Register SIGINT and SIGTERM to cancel `token`.
///
/// Registration is best-effort; failures are logged but not fatal.
pub fn cancel_on_shutdown_signals(token: &CancellationToken) {
    for (signal, name) in [(SIGINT, "SIGINT"), (SIGTERM, "SIGTERM")] {
        if let Err(error) = signal_hook::flag::register(signal, token.flag()) {
            tracing::warn!(signal = name, %error, "failed to register signal handler");
        }
    }
}
