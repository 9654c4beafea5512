//! Identifier for traffic held at a breakpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque key issued by the backend for a paused (or resent) transaction.
///
/// The front-end never interprets the key; it is only used to match the
/// editor's acknowledgment back to the entry it operated on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PauseKey(String);

impl PauseKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PauseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PauseKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PauseKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
