//! Parsing backend traffic JSON structures.
//!
//! The backend emits flat records with a `transaction_state` string and
//! every response field present (zero or null before it is known). They are
//! converted into [`TrafficRecord`]s whose phase only carries the fields
//! valid for that state.

use ezs_core::{PhaseFields, SessionId, TrafficId, TrafficPhase, TrafficRecord, TransactionState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Live traffic row
// ============================================================================

/// Raw traffic row pushed with `new-traffic` and returned by imports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTraffic {
    pub id: u64,
    pub method: String,
    pub uri: String,
    pub session_id: String,
    pub transaction_state: TransactionState,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub status: Option<u16>,
    /// Total duration in milliseconds
    #[serde(default)]
    pub time: Option<u64>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RawTraffic {
    /// Converts into the domain record.
    pub fn into_record(self) -> TrafficRecord {
        let phase = TrafficPhase::assemble(
            self.transaction_state,
            PhaseFields {
                status: self.status,
                mime: self.mime,
                size: self.size,
                elapsed_ms: self.time,
                error: self.error,
            },
        );
        TrafficRecord {
            id: TrafficId::new(self.id),
            session_id: SessionId::new(self.session_id),
            method: self.method,
            uri: self.uri,
            host: self.host,
            path: self.path,
            start_time: self.start_time,
            phase,
        }
    }
}

impl From<RawTraffic> for TrafficRecord {
    fn from(raw: RawTraffic) -> Self {
        raw.into_record()
    }
}

// ============================================================================
// Paused (editable) traffic
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderItem {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    #[serde(default)]
    pub items: Vec<HeaderItem>,
    #[serde(default)]
    pub size: u64,
}

impl Headers {
    /// First header value with a case-insensitive name match.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
            .map(|item| item.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyContent {
    #[serde(default)]
    pub encode: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Which side of the exchange the breakpoint stopped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseKind {
    Request,
    Response,
    Resend,
}

/// The transaction part of a paused payload.
///
/// Fields the editor needs are typed; everything else the backend sends
/// (hex dumps, body files) is kept verbatim in `extra` so the editor
/// snapshot loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausedTransaction {
    pub gid: u64,
    pub uri: String,
    pub method: String,
    #[serde(default)]
    pub req_headers: Headers,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub http_version: String,
    #[serde(default)]
    pub res_headers: Headers,
    pub transaction_state: TransactionState,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full editable payload delivered with `pause-traffic` / `resend-traffic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausedTraffic {
    pub traffic: PausedTransaction,
    pub traffic_type: PauseKind,
    #[serde(default)]
    pub body: Option<BodyContent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_traffic_pending_has_no_response_fields() {
        let raw: RawTraffic = serde_json::from_value(json!({
            "id": 7,
            "method": "GET",
            "mime": "",
            "size": null,
            "status": 0,
            "time": null,
            "uri": "https://example.com/",
            "path": "/",
            "host": "example.com",
            "transaction_state": "Pending",
            "start_time": null,
            "session_id": "1"
        }))
        .unwrap();

        let record = raw.into_record();
        assert_eq!(record.id, TrafficId::new(7));
        assert_eq!(record.phase, TrafficPhase::Pending);
        assert_eq!(record.status_text(), "");
        assert_eq!(record.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_raw_traffic_completed_keeps_response_fields() {
        let raw: RawTraffic = serde_json::from_value(json!({
            "id": 8,
            "method": "POST",
            "mime": "application/json",
            "size": 1024,
            "status": 201,
            "time": 42,
            "uri": "https://api.example.com/items",
            "transaction_state": "Completed",
            "session_id": "1718000000000"
        }))
        .unwrap();

        let record = TrafficRecord::from(raw);
        assert_eq!(record.state(), TransactionState::Completed);
        assert_eq!(record.phase.status(), Some(201));
        assert_eq!(record.phase.size(), Some(1024));
        assert_eq!(record.phase.elapsed_ms(), Some(42));
        assert_eq!(record.session_id.as_str(), "1718000000000");
    }

    #[test]
    fn test_raw_traffic_rejects_unknown_state() {
        let result = serde_json::from_value::<RawTraffic>(json!({
            "id": 1,
            "method": "GET",
            "uri": "/",
            "session_id": "1",
            "transaction_state": "Sleeping"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_paused_traffic_preserves_unknown_fields() {
        let paused: PausedTraffic = serde_json::from_value(json!({
            "traffic": {
                "gid": 3,
                "uri": "https://example.com/login",
                "method": "POST",
                "req_headers": {"items": [{"name": "Content-Type", "value": "text/plain"}], "size": 1},
                "transaction_state": "Requesting",
                "req_body_hex": [{"offset_address": 0}]
            },
            "traffic_type": "request",
            "body": {"encode": "utf8", "value": "user=a", "size": 6}
        }))
        .unwrap();

        assert_eq!(paused.traffic_type, PauseKind::Request);
        assert_eq!(paused.traffic.req_headers.get("content-type"), Some("text/plain"));
        assert!(paused.traffic.extra.contains_key("req_body_hex"));

        let back = serde_json::to_value(&paused).unwrap();
        assert_eq!(back["traffic"]["req_body_hex"][0]["offset_address"], 0);
    }
}
