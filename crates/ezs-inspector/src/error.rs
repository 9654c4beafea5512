//! Inspector error types.
//!
//! Errors are split along how they surface:
//! - `SettingsError`: persistence failures, always returned to the caller
//! - `BackendError`: a backend command failed; local state is left as it was
//! - `InspectorError`: what facade operations return, including user-input
//!   errors that abort an operation before anything changes

use std::path::PathBuf;

use thiserror::Error;

use ezs_protocol::ProtocolError;
use ezs_window::WindowError;

/// Durable settings failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read or parsed.
    #[error("failed to load settings from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// Writing settings to disk failed.
    #[error("failed to persist settings: {0}")]
    Persist(String),

    /// A value could not be converted to or from JSON.
    #[error("invalid value for setting {key}: {reason}")]
    Value { key: String, reason: String },

    /// The settings actor has shut down.
    #[error("settings channel closed")]
    ChannelClosed,
}

/// A backend command failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend replied with its bare failure marker or a protocol error.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Shorthand for a bare failure marker reply to `command`.
    pub fn failed(command: &str) -> Self {
        Self::Protocol(ProtocolError::Failed {
            command: command.to_string(),
        })
    }
}

/// Configuration file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors returned by inspector operations.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// The operation needs a file and none was given.
    #[error("no file selected")]
    NoFileSelected,

    /// The operation needs a non-empty selection of traffic.
    #[error("no traffic selected")]
    NoTrafficSelected,

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("unknown breakpoint: {0}")]
    UnknownBreakpoint(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

impl InspectorError {
    /// True for mistakes the user can fix (shown as a notification).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NoFileSelected
                | Self::NoTrafficSelected
                | Self::UnknownSession(_)
                | Self::UnknownBreakpoint(_)
        )
    }
}
