//! Logical capture sessions (tabs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier of the session that always exists after a reset.
pub const DEFAULT_SESSION_ID: &str = "1";

/// Label of the default session.
pub const DEFAULT_SESSION_LABEL: &str = "Session 1";

/// Unique identifier for a logical session.
///
/// The default session uses `"1"`; sessions created later use the
/// millisecond timestamp of their creation (e.g. `"1718000000000"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier of the default session.
    pub fn default_session() -> Self {
        Self(DEFAULT_SESSION_ID.to_string())
    }

    /// Creates an identifier from a point in time (millisecond precision).
    pub fn from_time(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_millis().to_string())
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Session
// ============================================================================

/// A logical grouping of captured or imported traffic, shown as a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub label: String,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// The session every store starts from and resets to.
    pub fn default_session() -> Self {
        Self::new(SessionId::default_session(), DEFAULT_SESSION_LABEL)
    }

    /// Derives a tab label from an imported file path.
    ///
    /// Uses the file's base name without its extension; falls back to the
    /// whole path when no base name can be extracted.
    pub fn label_for_path(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }
}
