/// Structured error types for text2sql-core.
///
/// Library crates get `thiserror` enums; the `text2sql` binary wraps them in
/// `anyhow` with context.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a user-supplied connection URI was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// Not parseable as a URI at all
    #[error("malformed database URI: {reason}")]
    Malformed { reason: String },

    /// Scheme is not one of the known SQL dialects
    #[error("unknown database scheme '{scheme}'")]
    UnknownScheme { scheme: String },

    /// Network dialects need a host
    #[error("database URI for {scheme} must include a host")]
    MissingHost { scheme: String },

    /// SQLite needs a file path
    #[error("sqlite URI must include a database path")]
    MissingPath,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl UriError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub fn unknown_scheme(scheme: impl Into<String>) -> Self {
        Self::UnknownScheme {
            scheme: scheme.into(),
        }
    }
}
