//! Captured traffic records and their transaction lifecycle.

use crate::error::{DomainError, DomainResult};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Integer id the backend assigns to a transaction within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficId(u64);

impl TrafficId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrafficId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TrafficId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for TrafficId {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| DomainError::ParseError {
                field: "traffic id".to_string(),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// Transaction State
// ============================================================================

/// Position of a transaction in the capture pipeline.
///
/// Variants are declared in pipeline order; `Failed` and `Aborted` are
/// terminal alternatives to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    /// Initialised, waiting to be sent
    Pending,
    /// Request is being sent upstream
    Requesting,
    /// Response is being received
    Responding,
    /// Response fully received
    ResponseDone,
    /// Transaction finished
    Completed,
    Failed,
    Aborted,
}

impl TransactionState {
    /// Ordinal along the pipeline. Terminal states share the highest rank.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Requesting => 1,
            Self::Responding => 2,
            Self::ResponseDone => 3,
            Self::Completed | Self::Failed | Self::Aborted => 4,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    /// Returns true if moving from `self` to `next` goes backwards.
    #[must_use]
    pub fn is_regression_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return self != next;
        }
        next.rank() < self.rank()
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Requesting => "Requesting",
            Self::Responding => "Responding",
            Self::ResponseDone => "ResponseDone",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Requesting" => Ok(Self::Requesting),
            "Responding" => Ok(Self::Responding),
            "ResponseDone" => Ok(Self::ResponseDone),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Aborted" => Ok(Self::Aborted),
            other => Err(DomainError::invalid(
                "transaction_state",
                other,
                "one of Pending, Requesting, Responding, ResponseDone, Completed, Failed, Aborted",
            )),
        }
    }
}

// ============================================================================
// Phase (state + the fields valid in that state)
// ============================================================================

/// Transaction state together with the response data available at that point.
///
/// Fields only appear on the variants where the backend has produced them:
/// a `Pending` record has no status code, a `Completed` one has a size and
/// a duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum TrafficPhase {
    Pending,
    Requesting,
    Responding {
        status: u16,
        mime: String,
    },
    ResponseDone {
        status: u16,
        mime: String,
        size: u64,
    },
    Completed {
        status: u16,
        mime: String,
        size: u64,
        elapsed_ms: u64,
    },
    Failed {
        status: Option<u16>,
        error: Option<String>,
    },
    Aborted,
}

/// Loose per-field data used to assemble a [`TrafficPhase`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseFields {
    pub status: Option<u16>,
    pub mime: Option<String>,
    pub size: Option<u64>,
    pub elapsed_ms: Option<u64>,
    pub error: Option<String>,
}

impl TrafficPhase {
    /// Builds the phase for `state`, keeping only the fields valid for it.
    ///
    /// Missing values the state requires fall back to zero / empty.
    pub fn assemble(state: TransactionState, fields: PhaseFields) -> Self {
        let status = fields.status.unwrap_or(0);
        let mime = fields.mime.unwrap_or_default();
        let size = fields.size.unwrap_or(0);
        match state {
            TransactionState::Pending => Self::Pending,
            TransactionState::Requesting => Self::Requesting,
            TransactionState::Responding => Self::Responding { status, mime },
            TransactionState::ResponseDone => Self::ResponseDone { status, mime, size },
            TransactionState::Completed => Self::Completed {
                status,
                mime,
                size,
                elapsed_ms: fields.elapsed_ms.unwrap_or(0),
            },
            TransactionState::Failed => Self::Failed {
                status: fields.status.filter(|s| *s != 0),
                error: fields.error,
            },
            TransactionState::Aborted => Self::Aborted,
        }
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        match self {
            Self::Pending => TransactionState::Pending,
            Self::Requesting => TransactionState::Requesting,
            Self::Responding { .. } => TransactionState::Responding,
            Self::ResponseDone { .. } => TransactionState::ResponseDone,
            Self::Completed { .. } => TransactionState::Completed,
            Self::Failed { .. } => TransactionState::Failed,
            Self::Aborted => TransactionState::Aborted,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Responding { status, .. }
            | Self::ResponseDone { status, .. }
            | Self::Completed { status, .. } => Some(*status),
            Self::Failed { status, .. } => *status,
            Self::Pending | Self::Requesting | Self::Aborted => None,
        }
    }

    pub fn mime(&self) -> Option<&str> {
        match self {
            Self::Responding { mime, .. }
            | Self::ResponseDone { mime, .. }
            | Self::Completed { mime, .. } => Some(mime),
            _ => None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            Self::ResponseDone { size, .. } | Self::Completed { size, .. } => Some(*size),
            _ => None,
        }
    }

    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            Self::Completed { elapsed_ms, .. } => Some(*elapsed_ms),
            _ => None,
        }
    }
}

// ============================================================================
// Traffic Record
// ============================================================================

/// One row of the live traffic table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub id: TrafficId,
    pub session_id: SessionId,
    pub method: String,
    pub uri: String,
    pub host: Option<String>,
    pub path: Option<String>,
    pub start_time: Option<String>,
    pub phase: TrafficPhase,
}

impl TrafficRecord {
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.phase.state()
    }

    /// Status code rendered the way the list shows it (`""` before a response).
    pub fn status_text(&self) -> String {
        self.phase
            .status()
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_rank_is_pipeline_order() {
        let order = [
            TransactionState::Pending,
            TransactionState::Requesting,
            TransactionState::Responding,
            TransactionState::ResponseDone,
            TransactionState::Completed,
        ];
        for pair in order.windows(2) {
            if let [a, b] = pair {
                assert!(a.rank() < b.rank(), "{a} should come before {b}");
            }
        }
    }

    #[test]
    fn test_terminal_states_never_go_back() {
        assert!(TransactionState::Completed.is_regression_to(TransactionState::Pending));
        assert!(TransactionState::Failed.is_regression_to(TransactionState::Completed));
        assert!(!TransactionState::Aborted.is_regression_to(TransactionState::Aborted));
        assert!(!TransactionState::Requesting.is_regression_to(TransactionState::Failed));
        assert!(TransactionState::Responding.is_regression_to(TransactionState::Requesting));
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!(
            "ResponseDone".parse::<TransactionState>().unwrap(),
            TransactionState::ResponseDone
        );
        assert!("pending".parse::<TransactionState>().is_err());
    }

    #[test]
    fn test_assemble_drops_fields_invalid_for_state() {
        let fields = PhaseFields {
            status: Some(200),
            mime: Some("text/html".to_string()),
            size: Some(512),
            elapsed_ms: Some(30),
            error: None,
        };

        assert_eq!(
            TrafficPhase::assemble(TransactionState::Pending, fields.clone()),
            TrafficPhase::Pending
        );
        assert_eq!(
            TrafficPhase::assemble(TransactionState::Responding, fields.clone()),
            TrafficPhase::Responding {
                status: 200,
                mime: "text/html".to_string()
            }
        );
        let done = TrafficPhase::assemble(TransactionState::Completed, fields);
        assert_eq!(done.size(), Some(512));
        assert_eq!(done.elapsed_ms(), Some(30));
        assert_eq!(done.state(), TransactionState::Completed);
    }

    #[test]
    fn test_failed_phase_ignores_zero_status() {
        let phase = TrafficPhase::assemble(
            TransactionState::Failed,
            PhaseFields {
                status: Some(0),
                error: Some("connection reset".to_string()),
                ..PhaseFields::default()
            },
        );
        assert_eq!(phase.status(), None);
        assert!(matches!(phase, TrafficPhase::Failed { error: Some(_), .. }));
    }

    #[test]
    fn test_traffic_id_from_str() {
        assert_eq!("17".parse::<TrafficId>().unwrap(), TrafficId::new(17));
        assert!("x17".parse::<TrafficId>().is_err());
    }
}
