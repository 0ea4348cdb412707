//! TCH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TachoError>;

/// Top-level error type for inverter_tacho.
///
/// Data irregularities inside stored snapshots never surface here; the
/// analysis pipeline absorbs them as skip reasons.
#[derive(Debug, Error)]
pub enum TachoError {
    #[error("[TCH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TCH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TCH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TCH-2001] snapshot store unavailable at {path}: {details}")]
    StoreUnavailable { path: PathBuf, details: String },

    #[error("[TCH-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TCH-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[TCH-3001] request to {url} failed: {details}")]
    Http { url: String, details: String },

    #[error("[TCH-3002] request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("[TCH-3003] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TCH-3004] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[TCH-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TachoError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TCH-1001",
            Self::MissingConfig { .. } => "TCH-1002",
            Self::ConfigParse { .. } => "TCH-1003",
            Self::StoreUnavailable { .. } => "TCH-2001",
            Self::Serialization { .. } => "TCH-2101",
            Self::Sql { .. } => "TCH-2102",
            Self::Http { .. } => "TCH-3001",
            Self::HttpStatus { .. } => "TCH-3002",
            Self::Io { .. } => "TCH-3003",
            Self::ChannelClosed { .. } => "TCH-3004",
            Self::Runtime { .. } => "TCH-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// The poll loop retries on its next tick regardless; this only feeds
    /// log severity and CLI exit decisions.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. }
                | Self::HttpStatus { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Sql { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TachoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for TachoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TachoError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
