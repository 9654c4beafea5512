//! Seam to the native capture backend.
//!
//! Every method maps to one backend command. Implementations decode the
//! reply with [`BackendReply`](ezs_protocol::BackendReply) so a bare
//! `"Fail"` surfaces as a recoverable [`BackendError`].

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ezs_core::{SessionId, TrafficId};
use ezs_protocol::{
    Breakpoint, DebuggerCommand, RawTraffic, SearchQuery, SearchResult, TrafficModification,
};

use crate::error::BackendError;

/// Capture file formats the backend can import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// Native session file
    Session,
    Har,
    /// Charles session export
    Charles,
}

impl ImportKind {
    /// Backend command name.
    pub fn command(self) -> &'static str {
        match self {
            Self::Session => "import_session",
            Self::Har => "import_har",
            Self::Charles => "import_charles",
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Har => "HAR",
            Self::Charles => "Charles",
        })
    }
}

/// Commands the front-end sends to the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `handle_debugger_command`
    async fn debugger_command(&self, command: DebuggerCommand) -> Result<(), BackendError>;

    /// Replaces the breakpoints the backend enforces.
    async fn update_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> Result<(), BackendError> {
        self.debugger_command(DebuggerCommand::UpdateBreakpoint { breakpoints })
            .await
    }

    async fn remove_breakpoints(&self, ids: Vec<String>) -> Result<(), BackendError> {
        self.debugger_command(DebuggerCommand::RemoveBreakpoint { ids })
            .await
    }

    /// Full request/response detail of one transaction.
    async fn get_traffic_detail(
        &self,
        session: &SessionId,
        id: TrafficId,
    ) -> Result<Value, BackendError>;

    async fn search(
        &self,
        session: &SessionId,
        query: &SearchQuery,
    ) -> Result<SearchResult, BackendError>;

    /// Routes live traffic into `session`.
    async fn change_monitor_traffic(&self, session: &SessionId) -> Result<(), BackendError>;

    async fn get_monitor_session_id(&self) -> Result<Option<SessionId>, BackendError>;

    /// Parses a capture file into records for `session`.
    async fn import(
        &self,
        kind: ImportKind,
        path: &Path,
        session: &SessionId,
    ) -> Result<Vec<RawTraffic>, BackendError>;

    async fn export_traffic(&self, session: &SessionId, path: &Path) -> Result<(), BackendError>;

    async fn delete_traffic(
        &self,
        session: &SessionId,
        ids: &[TrafficId],
    ) -> Result<(), BackendError>;

    /// Replays an edited transaction as a new request (`on_resend`).
    async fn resend(&self, modification: TrafficModification) -> Result<(), BackendError>;
}

/// Backend for headless runs: acknowledges every command, stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

#[async_trait]
impl Backend for OfflineBackend {
    async fn debugger_command(&self, _command: DebuggerCommand) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get_traffic_detail(
        &self,
        _session: &SessionId,
        id: TrafficId,
    ) -> Result<Value, BackendError> {
        Err(BackendError::Unavailable(format!(
            "no detail for traffic {id} without a backend"
        )))
    }

    async fn search(
        &self,
        _session: &SessionId,
        query: &SearchQuery,
    ) -> Result<SearchResult, BackendError> {
        Ok(SearchResult {
            text: query.text.clone(),
            search_data: Vec::new(),
        })
    }

    async fn change_monitor_traffic(&self, _session: &SessionId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get_monitor_session_id(&self) -> Result<Option<SessionId>, BackendError> {
        Ok(None)
    }

    async fn import(
        &self,
        _kind: ImportKind,
        _path: &Path,
        _session: &SessionId,
    ) -> Result<Vec<RawTraffic>, BackendError> {
        Ok(Vec::new())
    }

    async fn export_traffic(&self, _session: &SessionId, _path: &Path) -> Result<(), BackendError> {
        Ok(())
    }

    async fn delete_traffic(
        &self,
        _session: &SessionId,
        _ids: &[TrafficId],
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn resend(&self, _modification: TrafficModification) -> Result<(), BackendError> {
        Ok(())
    }
}
