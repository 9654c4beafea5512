//! Event and message types crossing process boundaries.

use std::collections::BTreeMap;

use ezs_core::{PauseKey, TrafficRecord, WindowLabel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::parse::{PausedTraffic, RawTraffic};

/// Event name for a new or updated traffic row.
pub const NEW_TRAFFIC_EVENT: &str = "new-traffic";

/// Event name for traffic held by a breakpoint.
pub const PAUSE_TRAFFIC_EVENT: &str = "pause-traffic";

/// Event name for traffic queued for editing before a replay.
pub const RESEND_TRAFFIC_EVENT: &str = "resend-traffic";

// ============================================================================
// Backend push envelope
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadStatus {
    Success,
    Fail,
}

/// Envelope every backend push arrives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload<T> {
    pub status: PayloadStatus,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Payload<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: PayloadStatus::Success,
            message: String::new(),
            data: Some(data),
        }
    }

    /// Unwraps the data of a successful push.
    pub fn into_data(self, event: &str) -> Result<T, ProtocolError> {
        match (self.status, self.data) {
            (PayloadStatus::Success, Some(data)) => Ok(data),
            (PayloadStatus::Success, None) => Err(ProtocolError::malformed(event, "missing data")),
            (PayloadStatus::Fail, _) => Err(ProtocolError::EventFailed {
                event: event.to_string(),
                message: self.message,
            }),
        }
    }
}

// ============================================================================
// Backend push events
// ============================================================================

/// Unsolicited events from the native backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendPush {
    /// A traffic row was created or advanced.
    NewTraffic(Box<TrafficRecord>),

    /// A breakpoint held a transaction.
    PauseTraffic {
        key: PauseKey,
        payload: Box<PausedTraffic>,
    },

    /// A transaction was queued for editing before being replayed.
    ResendTraffic {
        key: PauseKey,
        payload: Box<PausedTraffic>,
    },
}

impl BackendPush {
    /// Decodes a push from its event name and JSON envelope.
    pub fn from_event(event: &str, envelope: serde_json::Value) -> Result<Self, ProtocolError> {
        match event {
            NEW_TRAFFIC_EVENT => {
                let raw: RawTraffic = decode_data(event, envelope)?;
                Ok(Self::NewTraffic(Box::new(raw.into_record())))
            }
            PAUSE_TRAFFIC_EVENT => {
                let (key, payload): (PauseKey, PausedTraffic) = decode_data(event, envelope)?;
                Ok(Self::PauseTraffic {
                    key,
                    payload: Box::new(payload),
                })
            }
            RESEND_TRAFFIC_EVENT => {
                let (key, payload): (PauseKey, PausedTraffic) = decode_data(event, envelope)?;
                Ok(Self::ResendTraffic {
                    key,
                    payload: Box::new(payload),
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// The event name this push was delivered under.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::NewTraffic(_) => NEW_TRAFFIC_EVENT,
            Self::PauseTraffic { .. } => PAUSE_TRAFFIC_EVENT,
            Self::ResendTraffic { .. } => RESEND_TRAFFIC_EVENT,
        }
    }
}

fn decode_data<T: DeserializeOwned>(
    event: &str,
    envelope: serde_json::Value,
) -> Result<T, ProtocolError> {
    let payload: Payload<T> =
        serde_json::from_value(envelope).map_err(|e| ProtocolError::malformed(event, e))?;
    payload.into_data(event)
}

// ============================================================================
// Cross-window messages
// ============================================================================

/// Lifecycle messages every window sends to the main window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowMessage {
    /// A child finished starting up; sent exactly once per window.
    Created {
        label: WindowLabel,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_label: Option<WindowLabel>,
    },

    /// A window asks to be closed (after its own close gates passed).
    CloseRequested { label: WindowLabel },
}

/// Breakpoint pipeline messages between the main window and the pause editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineMessage {
    /// Full resync of every paused entry. Idempotent: receivers replace
    /// their whole view with `entries`.
    BreakpointSnapshot {
        entries: BTreeMap<PauseKey, PausedTraffic>,
    },

    /// The editor loaded and wants the current snapshot.
    Open,

    /// The editor forwarded an edited version of `key`.
    Modification { key: PauseKey },

    /// The editor forwarded `key` unmodified.
    Send { key: PauseKey },

    /// The editor replayed `key` as a new request.
    Resend { key: PauseKey },
}

impl PipelineMessage {
    /// The paused entry this message settles, for the three editor outcomes.
    pub fn acknowledged_key(&self) -> Option<&PauseKey> {
        match self {
            Self::Modification { key } | Self::Send { key } | Self::Resend { key } => Some(key),
            Self::BreakpointSnapshot { .. } | Self::Open => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezs_core::{TrafficId, TransactionState};
    use serde_json::json;

    fn paused_json() -> serde_json::Value {
        json!({
            "traffic": {
                "gid": 11,
                "uri": "https://example.com/a",
                "method": "GET",
                "transaction_state": "Requesting"
            },
            "traffic_type": "request",
            "body": null
        })
    }

    #[test]
    fn test_new_traffic_event() {
        let envelope = json!({
            "status": "Success",
            "message": "traffic updated",
            "data": {
                "id": 7,
                "method": "GET",
                "uri": "https://example.com/",
                "session_id": "1",
                "transaction_state": "Pending"
            }
        });

        let push = BackendPush::from_event(NEW_TRAFFIC_EVENT, envelope).unwrap();
        match push {
            BackendPush::NewTraffic(record) => {
                assert_eq!(record.id, TrafficId::new(7));
                assert_eq!(record.state(), TransactionState::Pending);
            }
            other => panic!("Expected NewTraffic, got {other:?}"),
        }
    }

    #[test]
    fn test_pause_event_carries_key_and_payload() {
        let envelope = json!({"status": "Success", "message": "", "data": ["k1", paused_json()]});
        let push = BackendPush::from_event(PAUSE_TRAFFIC_EVENT, envelope).unwrap();
        assert_eq!(push.event_name(), PAUSE_TRAFFIC_EVENT);
        match push {
            BackendPush::PauseTraffic { key, payload } => {
                assert_eq!(key.as_str(), "k1");
                assert_eq!(payload.traffic.gid, 11);
            }
            other => panic!("Expected PauseTraffic, got {other:?}"),
        }
    }

    #[test]
    fn test_resend_event() {
        let envelope = json!({"status": "Success", "data": ["r9", paused_json()]});
        let push = BackendPush::from_event(RESEND_TRAFFIC_EVENT, envelope).unwrap();
        assert!(matches!(push, BackendPush::ResendTraffic { .. }));
    }

    #[test]
    fn test_failed_envelope_is_an_error() {
        let envelope = json!({"status": "Fail", "message": "proxy stopped", "data": null});
        let err = BackendPush::from_event(NEW_TRAFFIC_EVENT, envelope).unwrap_err();
        assert!(matches!(err, ProtocolError::EventFailed { .. }));
    }

    #[test]
    fn test_unknown_event() {
        let err = BackendPush::from_event("reload", json!({})).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownEvent("reload".to_string()));
    }

    #[test]
    fn test_window_message_serialization() {
        let msg = WindowMessage::Created {
            label: WindowLabel::new("child_-settings"),
            parent_label: Some(WindowLabel::main()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"created\""));
        assert!(json.contains("\"parent_label\":\"main\""));

        let msg = WindowMessage::CloseRequested {
            label: WindowLabel::new("child_-settings"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"close_requested\""));
    }

    #[test]
    fn test_acknowledged_key() {
        let key = PauseKey::new("k1");
        for msg in [
            PipelineMessage::Modification { key: key.clone() },
            PipelineMessage::Send { key: key.clone() },
            PipelineMessage::Resend { key: key.clone() },
        ] {
            assert_eq!(msg.acknowledged_key(), Some(&key));
        }
        assert!(PipelineMessage::Open.acknowledged_key().is_none());
    }
}
