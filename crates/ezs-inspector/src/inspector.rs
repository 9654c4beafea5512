//! Main-window state and its event loop.
//!
//! [`Inspector`] owns every store the main window keeps and is driven by
//! three sources: backend pushes, messages from the pause editor, and
//! window lifecycle events from the coordinator.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Backend failures are returned with local state left as it was
//! - Coordination failures are logged and absorbed

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ezs_core::{SessionId, TrafficId};
use ezs_protocol::{
    BackendPush, Breakpoint, BreakpointConditions, BreakpointsConfig, RawTraffic,
};
use ezs_window::{BusEnvelope, CoordinatorHandle, MessageBus, WindowClient, WindowEvent};

use crate::backend::{Backend, ImportKind};
use crate::breakpoints::BreakpointBook;
use crate::config::InspectorConfig;
use crate::error::InspectorError;
use crate::orchestrator::BreakpointOrchestrator;
use crate::search::SearchOverlay;
use crate::session::SessionStore;
use crate::settings::{keys, SettingsHandle};
use crate::traffic::TrafficPipeline;

/// What one turn of the event loop produced.
enum Step {
    Push(BackendPush),
    Editor(BusEnvelope),
    Window(WindowEvent),
    Idle,
    Stop,
}

pub struct Inspector {
    window: WindowClient,
    settings: SettingsHandle,
    backend: Arc<dyn Backend>,
    sessions: SessionStore,
    traffic: TrafficPipeline,
    search: SearchOverlay,
    breakpoints: BreakpointBook,
    orchestrator: BreakpointOrchestrator,
    window_events: broadcast::Receiver<WindowEvent>,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("window", &self.window.label())
            .field("sessions", &self.sessions.len())
            .field("paused", &self.orchestrator.paused().len())
            .finish_non_exhaustive()
    }
}

impl Inspector {
    /// Prepares the main window's state.
    ///
    /// Creates the `breakpoints` and `port` settings when absent, restores
    /// sessions and breakpoints, and pushes the breakpoints in force to the
    /// backend. A backend failure there is logged, not fatal.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::Settings` if a default could not be saved.
    pub async fn bootstrap(
        config: &InspectorConfig,
        settings: SettingsHandle,
        backend: Arc<dyn Backend>,
        coordinator: CoordinatorHandle,
        bus: MessageBus,
    ) -> Result<Self, InspectorError> {
        if settings.get(keys::BREAKPOINTS).await.is_none() {
            settings
                .set(keys::BREAKPOINTS, BreakpointsConfig::default())
                .await?;
        }
        if settings.get(keys::PORT).await.is_none() {
            settings.set(keys::PORT, config.default_port).await?;
        }

        let sessions = SessionStore::restore(settings.clone()).await;
        let breakpoints = BreakpointBook::load(settings.clone()).await;
        if let Err(e) = breakpoints.sync(backend.as_ref()).await {
            warn!(error = %e, "failed to push breakpoints to backend");
        }

        let window_events = coordinator.subscribe();
        let orchestrator = BreakpointOrchestrator::new(coordinator.clone(), bus);
        let window = WindowClient::main_with_timeout(coordinator, config.close_gate_timeout());

        info!(
            sessions = sessions.len(),
            current = %sessions.current(),
            breakpoints = breakpoints.len(),
            "inspector ready"
        );
        Ok(Self {
            window,
            settings,
            backend,
            sessions,
            traffic: TrafficPipeline::new(),
            search: SearchOverlay::new(),
            breakpoints,
            orchestrator,
            window_events,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn window(&self) -> &WindowClient {
        &self.window
    }

    /// The main window's client, for registering close gates.
    pub fn window_mut(&mut self) -> &mut WindowClient {
        &mut self.window
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn traffic(&self) -> &TrafficPipeline {
        &self.traffic
    }

    pub fn search_overlay(&self) -> &SearchOverlay {
        &self.search
    }

    pub fn breakpoints(&self) -> &BreakpointBook {
        &self.breakpoints
    }

    pub fn orchestrator(&self) -> &BreakpointOrchestrator {
        &self.orchestrator
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Applies backend pushes, editor messages and window events until
    /// `cancel` fires or the push channel closes.
    pub async fn run(&mut self, mut pushes: mpsc::Receiver<BackendPush>, cancel: CancellationToken) {
        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("inspector shutdown requested");
                    Step::Stop
                }

                push = pushes.recv() => match push {
                    Some(push) => Step::Push(push),
                    None => {
                        debug!("backend push channel closed");
                        Step::Stop
                    }
                },

                envelope = self.orchestrator.next_editor_message() => match envelope {
                    Some(envelope) => Step::Editor(envelope),
                    None => {
                        error!("message bus closed");
                        Step::Stop
                    }
                },

                event = self.window_events.recv() => match event {
                    Ok(event) => Step::Window(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "window event receiver lagged");
                        Step::Idle
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("coordinator gone");
                        Step::Stop
                    }
                },
            };

            match step {
                Step::Push(push) => self.handle_push(push).await,
                Step::Editor(envelope) => {
                    self.orchestrator.handle_editor_message(envelope);
                }
                Step::Window(event) => self.orchestrator.on_window_event(&event),
                Step::Idle => {}
                Step::Stop => break,
            }
        }
        debug!("inspector loop finished");
    }

    /// Applies one backend push.
    pub async fn handle_push(&mut self, push: BackendPush) {
        match push {
            BackendPush::NewTraffic(record) => {
                self.traffic.upsert(*record);
            }
            BackendPush::PauseTraffic { key, payload }
            | BackendPush::ResendTraffic { key, payload } => {
                // The entry is kept even if the editor failed to open.
                if let Err(e) = self.orchestrator.on_paused(key, *payload).await {
                    warn!(error = %e, "pause editor unavailable");
                }
            }
        }
    }

    /// Decodes and applies a push by event name. Undecodable pushes are
    /// logged and dropped.
    pub async fn handle_event(&mut self, event: &str, envelope: Value) -> bool {
        match BackendPush::from_event(event, envelope) {
            Ok(push) => {
                self.handle_push(push).await;
                true
            }
            Err(e) => {
                warn!(event, error = %e, "dropping backend push");
                false
            }
        }
    }

    /// Applies window events and editor messages that are already queued.
    pub fn process_pending(&mut self) {
        loop {
            match self.window_events.try_recv() {
                Ok(event) => self.orchestrator.on_window_event(&event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "window event receiver lagged");
                }
                Err(_) => break,
            }
        }
        self.orchestrator.drain_editor_messages();
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Displays `id`.
    ///
    /// # Errors
    ///
    /// Returns `InspectorError::UnknownSession` for an id not in the list.
    pub async fn select_session(&mut self, id: &SessionId) -> Result<(), InspectorError> {
        if self.sessions.set_current(id).await {
            Ok(())
        } else {
            Err(InspectorError::UnknownSession(id.to_string()))
        }
    }

    /// Closes a session tab. The last tab cannot be closed.
    ///
    /// Closing the monitored session moves recording to the session now
    /// displayed. The closed session's rows are dropped unless the backend
    /// refused that move and still records into it.
    pub async fn close_session(&mut self, id: &SessionId) -> bool {
        let was_listen = self.sessions.listen() == id;
        if !self.sessions.remove_session(id).await {
            return false;
        }

        if was_listen {
            let next = self.sessions.current().clone();
            if let Err(e) = self.backend.change_monitor_traffic(&next).await {
                warn!(session_id = %id, error = %e, "backend still records into closed session");
                return true;
            }
            self.sessions.set_listen(&next).await;
            info!(closed = %id, session_id = %next, "monitoring moved");
        }
        self.traffic.drop_session(id);
        true
    }

    /// Resets to the single default session and records into it.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; nothing is reset then.
    pub async fn remove_all_sessions(&mut self) -> Result<(), InspectorError> {
        let default = SessionId::default_session();
        self.backend.change_monitor_traffic(&default).await?;

        self.sessions.reset().await;
        self.traffic.clear();
        self.search.clear();
        Ok(())
    }

    /// Routes live traffic into `id`.
    ///
    /// # Errors
    ///
    /// - `InspectorError::UnknownSession` for an id not in the list
    /// - `InspectorError::Backend` if the backend refused; the listen
    ///   pointer does not move then
    pub async fn switch_monitor(&mut self, id: &SessionId) -> Result<(), InspectorError> {
        if !self.sessions.contains(id) {
            return Err(InspectorError::UnknownSession(id.to_string()));
        }
        self.backend.change_monitor_traffic(id).await?;
        self.sessions.set_listen(id).await;
        info!(session_id = %id, "monitoring session");
        Ok(())
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Imports a capture file into a new session and displays it.
    ///
    /// # Errors
    ///
    /// - `InspectorError::NoFileSelected` without a path; nothing changes
    /// - `InspectorError::Backend` if the import failed; the new session is
    ///   removed again
    pub async fn import(
        &mut self,
        kind: ImportKind,
        path: Option<&Path>,
    ) -> Result<SessionId, InspectorError> {
        let path = path.ok_or(InspectorError::NoFileSelected)?;
        let previous = self.sessions.current().clone();
        let session = self.sessions.create_for_path(path).await;

        match self.backend.import(kind, path, &session).await {
            Ok(rows) => {
                let count = self
                    .traffic
                    .insert_all(&session, rows.into_iter().map(RawTraffic::into_record));
                info!(
                    session_id = %session,
                    kind = %kind,
                    path = %path.display(),
                    rows = count,
                    "capture imported"
                );
                Ok(session)
            }
            Err(e) => {
                warn!(kind = %kind, path = %path.display(), error = %e, "import failed");
                self.sessions.remove_session(&session).await;
                self.sessions.set_current(&previous).await;
                Err(e.into())
            }
        }
    }

    /// Exports the displayed session's traffic.
    ///
    /// # Errors
    ///
    /// - `InspectorError::NoFileSelected` without a path
    /// - `InspectorError::Backend` if the export failed
    pub async fn export(&self, path: Option<&Path>) -> Result<(), InspectorError> {
        let path = path.ok_or(InspectorError::NoFileSelected)?;
        let session = self.sessions.current();
        self.backend.export_traffic(session, path).await?;
        info!(session_id = %session, path = %path.display(), "traffic exported");
        Ok(())
    }

    // ========================================================================
    // Traffic
    // ========================================================================

    /// Deletes rows from the displayed session, backend first.
    ///
    /// # Errors
    ///
    /// - `InspectorError::NoTrafficSelected` for an empty selection
    /// - `InspectorError::Backend` if the backend refused; no rows are removed
    pub async fn delete_traffic(&mut self, ids: &[TrafficId]) -> Result<usize, InspectorError> {
        if ids.is_empty() {
            return Err(InspectorError::NoTrafficSelected);
        }
        let session = self.sessions.current().clone();
        self.backend.delete_traffic(&session, ids).await?;

        let removed = self.traffic.delete(&session, ids);
        self.search.forget(&session, ids);
        debug!(session_id = %session, removed, "traffic deleted");
        Ok(removed)
    }

    /// Full detail of one row of the displayed session.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn traffic_detail(&self, id: TrafficId) -> Result<Value, InspectorError> {
        Ok(self
            .backend
            .get_traffic_detail(self.sessions.current(), id)
            .await?)
    }

    /// Searches the displayed session. Returns the number of rows shown.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the overlay is left as it was.
    pub async fn search(&mut self, keyword: &str) -> Result<usize, InspectorError> {
        let session = self.sessions.current().clone();
        Ok(self
            .search
            .search(self.backend.as_ref(), &self.traffic, &session, keyword)
            .await?)
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
    }

    // ========================================================================
    // Breakpoints
    // ========================================================================

    /// # Errors
    ///
    /// See [`BreakpointBook::add`].
    pub async fn add_breakpoint(
        &mut self,
        conditions: BreakpointConditions,
    ) -> Result<String, InspectorError> {
        self.breakpoints
            .add(self.backend.as_ref(), conditions)
            .await
    }

    /// # Errors
    ///
    /// See [`BreakpointBook::update`].
    pub async fn update_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<(), InspectorError> {
        self.breakpoints
            .update(self.backend.as_ref(), breakpoint)
            .await
    }

    /// # Errors
    ///
    /// See [`BreakpointBook::set_enabled`].
    pub async fn set_breakpoint_enabled(
        &mut self,
        id: &str,
        enabled: bool,
    ) -> Result<(), InspectorError> {
        self.breakpoints
            .set_enabled(self.backend.as_ref(), id, enabled)
            .await
    }

    /// # Errors
    ///
    /// See [`BreakpointBook::remove`].
    pub async fn remove_breakpoint(&mut self, id: &str) -> Result<(), InspectorError> {
        self.breakpoints.remove(self.backend.as_ref(), id).await
    }

    /// # Errors
    ///
    /// See [`BreakpointBook::set_tool_enabled`].
    pub async fn set_breakpoint_tool_enabled(&mut self, enabled: bool) -> Result<(), InspectorError> {
        self.breakpoints
            .set_tool_enabled(self.backend.as_ref(), enabled)
            .await
    }
}
