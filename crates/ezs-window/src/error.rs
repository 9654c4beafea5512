//! Window coordination errors.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by the coordinator handle and the native host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WindowError {
    /// The coordinator actor has shut down.
    #[error("window coordinator channel closed")]
    ChannelClosed,

    /// The native host refused an operation.
    #[error("window host error: {0}")]
    Host(String),
}

impl WindowError {
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }
}

/// Why a close-gate chain stopped a close request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloseGateError {
    /// A gate answered "deny".
    #[error("close denied by gate {index}")]
    Denied { index: usize },

    /// A gate failed; failures count as a denial.
    #[error("close gate {index} failed: {reason}")]
    Failed { index: usize, reason: String },

    /// A gate did not answer within the configured timeout.
    #[error("close gate {index} timed out after {timeout:?}")]
    TimedOut { index: usize, timeout: Duration },
}

impl CloseGateError {
    /// Position of the gate that stopped the chain, counted from the head
    /// of the chain as it was when the run started.
    pub fn index(&self) -> usize {
        match self {
            Self::Denied { index } | Self::Failed { index, .. } | Self::TimedOut { index, .. } => {
                *index
            }
        }
    }
}
