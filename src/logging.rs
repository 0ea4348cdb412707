//! Diagnostic logging on stderr via `tracing-subscriber`.
//!
//! Filter precedence: `TACHO_LOG`, then `RUST_LOG`, then the level implied by
//! `-v`/`-q`, then the configured level. stdout stays reserved for command
//! output.

#![allow(missing_docs)]

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Crate-specific filter variable.
pub const LOG_ENV: &str = "TACHO_LOG";

/// Verbosity requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    #[default]
    Normal,
    Verbose,
    Quiet,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }
}

/// Resolve the filter directive string.
pub fn filter_directive<F>(configured_level: &str, verbosity: Verbosity, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    for var in [LOG_ENV, EnvFilter::DEFAULT_ENV] {
        if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
            return value;
        }
    }
    let level = match verbosity {
        Verbosity::Verbose => "debug",
        Verbosity::Quiet => "error",
        Verbosity::Normal => configured_level,
    };
    format!("inverter_tacho={level},tacho={level}")
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(configured_level: &str, verbosity: Verbosity) {
    let directive = filter_directive(configured_level, verbosity, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|error| {
        eprintln!("tacho: ignoring invalid log filter {directive:?}: {error}");
        EnvFilter::new("inverter_tacho=info")
    });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
