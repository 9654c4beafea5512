//! Request and response payloads for backend commands.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProtocolError;

// ============================================================================
// Reply envelope
// ============================================================================

/// Bare marker the backend returns instead of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyMarker {
    Success,
    Fail,
}

/// A command reply: either a bare marker or a typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendReply<T> {
    Marker(ReplyMarker),
    Data(T),
}

impl<T> BackendReply<T> {
    /// `Fail` becomes an error; `Success` carries no data.
    pub fn into_result(self, command: &str) -> Result<Option<T>, ProtocolError> {
        match self {
            Self::Marker(ReplyMarker::Fail) => Err(ProtocolError::Failed {
                command: command.to_string(),
            }),
            Self::Marker(ReplyMarker::Success) => Ok(None),
            Self::Data(data) => Ok(Some(data)),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Which parts of a transaction a search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPosition {
    pub request_url: bool,
    pub request_header: bool,
    pub request_body: bool,
    pub response_header: bool,
    pub response_body: bool,
}

impl Default for SearchPosition {
    fn default() -> Self {
        Self {
            request_url: true,
            request_header: true,
            request_body: true,
            response_header: true,
            response_body: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub position: SearchPosition,
}

impl SearchQuery {
    /// Searches every part of the transaction.
    pub fn everywhere(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: SearchPosition::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub position: String,
    pub content: String,
    #[serde(default)]
    pub keyword_byte_index: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchData {
    /// Traffic id; the backend sends it as a string or a number.
    #[serde(deserialize_with = "lenient_id")]
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub search_item: Vec<SearchItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    #[serde(default)]
    pub search_data: Vec<SearchData>,
}

impl SearchResult {
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.search_data.iter().map(|d| d.id)
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Num(n) => Ok(n),
        Id::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Breakpoint definitions
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Conditions a breakpoint matches on. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub req_enable: bool,
    #[serde(default)]
    pub res_enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: BreakpointConditions,
}

fn default_enabled() -> bool {
    true
}

/// Persisted shape of the `breakpoints` setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointsConfig {
    #[serde(default)]
    pub breakpoints: BTreeMap<String, Breakpoint>,
    #[serde(rename = "toolEnabled", default = "default_enabled")]
    pub tool_enabled: bool,
}

impl Default for BreakpointsConfig {
    fn default() -> Self {
        Self {
            breakpoints: BTreeMap::new(),
            tool_enabled: true,
        }
    }
}

impl BreakpointsConfig {
    /// Breakpoints the backend should enforce right now.
    pub fn enabled(&self) -> Vec<Breakpoint> {
        if !self.tool_enabled {
            return Vec::new();
        }
        self.breakpoints
            .values()
            .filter(|bp| bp.enabled)
            .cloned()
            .collect()
    }
}

// ============================================================================
// Debugger commands
// ============================================================================

/// Edited transaction forwarded from the pause editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficModification {
    pub id: String,
    /// `request`, `response` or `resend`
    pub modified_type: String,
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_body: Option<String>,
}

/// Commands sent through `handle_debugger_command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DebuggerCommand {
    /// Forward a paused transaction unmodified.
    Continue { id: String },

    /// Forward an edited transaction.
    #[serde(rename = "traffic_modification")]
    ModifyTraffic(TrafficModification),

    UpdateBreakpoint { breakpoints: Vec<Breakpoint> },

    RemoveBreakpoint { ids: Vec<String> },
}

impl DebuggerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Continue { .. } => "continue",
            Self::ModifyTraffic(_) => "traffic_modification",
            Self::UpdateBreakpoint { .. } => "update_breakpoint",
            Self::RemoveBreakpoint { .. } => "remove_breakpoint",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_marker_and_data() {
        let reply: BackendReply<SearchResult> = serde_json::from_value(json!("Fail")).unwrap();
        assert_eq!(
            reply.into_result("search").unwrap_err(),
            ProtocolError::Failed {
                command: "search".to_string()
            }
        );

        let reply: BackendReply<SearchResult> = serde_json::from_value(json!("Success")).unwrap();
        assert_eq!(reply.into_result("search").unwrap(), None);

        let reply: BackendReply<SearchResult> =
            serde_json::from_value(json!({"text": "x", "search_data": []})).unwrap();
        assert!(reply.into_result("search").unwrap().is_some());
    }

    #[test]
    fn test_search_result_accepts_string_ids() {
        let result: SearchResult = serde_json::from_value(json!({
            "text": "login",
            "search_data": [
                {"id": "3", "url": "https://a/login", "search_item": []},
                {"id": 9, "url": "https://b/login"}
            ]
        }))
        .unwrap();
        assert_eq!(result.ids().collect::<Vec<_>>(), vec![3, 9]);
    }

    #[test]
    fn test_debugger_command_wire_shape() {
        let cmd = DebuggerCommand::Continue { id: "k1".to_string() };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"type": "continue", "id": "k1"})
        );

        let cmd = DebuggerCommand::ModifyTraffic(TrafficModification {
            id: "k2".to_string(),
            modified_type: "request".to_string(),
            url: "https://example.com".to_string(),
            method: "POST".to_string(),
            modified_headers: None,
            modified_body: Some("a=1".to_string()),
        });
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["type"], "traffic_modification");
        assert_eq!(value["modified_body"], "a=1");
        assert_eq!(cmd.name(), "traffic_modification");

        let cmd = DebuggerCommand::RemoveBreakpoint {
            ids: vec!["breakpoint_1".to_string()],
        };
        assert_eq!(serde_json::to_value(&cmd).unwrap()["type"], "remove_breakpoint");
    }

    #[test]
    fn test_breakpoints_config_defaults_and_enabled() {
        let config: BreakpointsConfig = serde_json::from_value(json!({
            "breakpoints": {
                "a": {"id": "a", "enabled": true, "conditions": {"url": "*/login"}},
                "b": {"id": "b", "enabled": false}
            }
        }))
        .unwrap();
        assert!(config.tool_enabled);
        let enabled = config.enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled.first().map(|bp| bp.id.as_str()), Some("a"));

        let off = BreakpointsConfig {
            tool_enabled: false,
            ..config
        };
        assert!(off.enabled().is_empty());

        assert_eq!(
            serde_json::to_value(BreakpointsConfig::default()).unwrap(),
            json!({"breakpoints": {}, "toolEnabled": true})
        );
    }
}
