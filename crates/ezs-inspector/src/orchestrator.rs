//! Breakpoint pause orchestration between the main window and the pause
//! editor.
//!
//! ```text
//!  backend ──pause/resend──▶ BreakpointOrchestrator ──create──▶ coordinator
//!                               │   ▲                                │
//!                       snapshot│   │open/modification/send/resend   ▼
//!                               ▼   │                          pause editor
//!                               MessageBus ◀──────────────── (PauseEditor)
//! ```
//!
//! The orchestrator owns the paused-entry table. Every editor outcome
//! removes exactly the key it names and is answered with a full snapshot,
//! so the editor's view is always a copy of the table.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use ezs_core::{PauseKey, WindowLabel, WindowTarget};
use ezs_protocol::{DebuggerCommand, PausedTraffic, PipelineMessage, TrafficModification};
use ezs_window::{
    BusEnvelope, CoordinatorHandle, CreatedWindow, Inbox, MessageBus, WindowError, WindowEvent,
    WindowHandle, WindowOverrides,
};

use crate::backend::Backend;
use crate::error::BackendError;

/// Logical URL of the pause editor window.
pub const PAUSE_EDITOR_URL: &str = "/breakpoint/pause";

const PAUSE_EDITOR_TITLE: &str = "Traffic Editor";
const PAUSE_EDITOR_WIDTH: f64 = 1000.0;

/// Paused entries keyed by the backend's pause key.
pub type PausedTable = BTreeMap<PauseKey, PausedTraffic>;

// ============================================================================
// Main-window side
// ============================================================================

#[derive(Debug)]
pub struct BreakpointOrchestrator {
    coordinator: CoordinatorHandle,
    owner: WindowLabel,
    bus: MessageBus,
    paused: PausedTable,
    /// Native instance of the open editor, if any.
    editor: Option<WindowHandle>,
    /// Messages from the editor; present once handlers are registered.
    inbox: Option<Inbox>,
}

impl BreakpointOrchestrator {
    pub fn new(coordinator: CoordinatorHandle, bus: MessageBus) -> Self {
        Self {
            coordinator,
            owner: WindowLabel::main(),
            bus,
            paused: PausedTable::new(),
            editor: None,
            inbox: None,
        }
    }

    pub fn editor_target() -> WindowTarget {
        WindowTarget::new(PAUSE_EDITOR_URL)
    }

    pub fn paused(&self) -> &PausedTable {
        &self.paused
    }

    pub fn contains(&self, key: &PauseKey) -> bool {
        self.paused.contains_key(key)
    }

    pub fn editor(&self) -> Option<&WindowLabel> {
        self.editor.as_ref().map(|handle| &handle.label)
    }

    pub fn editor_handle(&self) -> Option<&WindowHandle> {
        self.editor.as_ref()
    }

    /// Stores a paused (or resend-queued) transaction and brings up the
    /// editor.
    ///
    /// A newly created editor gets fresh handlers and asks for the snapshot
    /// itself; a reused one is sent the snapshot directly. Messages still
    /// queued from a previous editor are applied before its handlers go.
    /// The entry stays in the table even if the editor cannot be opened.
    ///
    /// # Errors
    ///
    /// - `WindowError::Host` if the editor window could not be created
    /// - `WindowError::ChannelClosed` if the coordinator has shut down
    pub async fn on_paused(
        &mut self,
        key: PauseKey,
        payload: PausedTraffic,
    ) -> Result<CreatedWindow, WindowError> {
        debug!(key = %key, kind = ?payload.traffic_type, "traffic paused");
        self.paused.insert(key, payload);

        let target = Self::editor_target();
        // Subscribe before the window exists so its first message is not missed.
        let (label, _) = target.resolve(&self.owner);
        let inbox = self.bus.listen_from(&label);

        let overrides = WindowOverrides {
            width: Some(PAUSE_EDITOR_WIDTH),
            ..WindowOverrides::default().title(PAUSE_EDITOR_TITLE)
        };
        let created = match self
            .coordinator
            .create_window(&self.owner, target, overrides)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                warn!(error = %e, paused = self.paused.len(), "failed to open pause editor");
                return Err(e);
            }
        };

        self.editor = Some(created.handle.clone());
        match self.inbox.take() {
            Some(current) if !created.is_new => {
                self.inbox = Some(current);
                self.broadcast_snapshot();
            }
            previous => {
                self.inbox = Some(inbox);
                if let Some(mut previous) = previous {
                    let handled = self.apply_queued(&mut previous);
                    debug!(handled, "applied messages from previous editor");
                }
                if created.is_new {
                    info!(label = %created.label, id = %created.handle.id, "pause editor opened");
                } else {
                    self.broadcast_snapshot();
                }
            }
        }
        Ok(created)
    }

    /// Applies one message from the editor.
    ///
    /// Returns the key an acknowledgment removed. Any acknowledgment is
    /// answered with the new snapshot, even when its key was already gone.
    pub fn handle_editor_message(&mut self, envelope: BusEnvelope) -> Option<PauseKey> {
        if let Some(key) = envelope.message.acknowledged_key() {
            let key = key.clone();
            if self.paused.remove(&key).is_some() {
                debug!(key = %key, remaining = self.paused.len(), "paused entry settled");
            } else {
                debug!(key = %key, "acknowledgment for unknown paused entry");
            }
            self.broadcast_snapshot();
            return Some(key);
        }

        match envelope.message {
            PipelineMessage::Open => self.broadcast_snapshot(),
            PipelineMessage::BreakpointSnapshot { .. } => {
                debug!(source = %envelope.source, "ignoring snapshot sent by editor");
            }
            // Acknowledgments were handled above.
            PipelineMessage::Modification { .. }
            | PipelineMessage::Send { .. }
            | PipelineMessage::Resend { .. } => {}
        }
        None
    }

    /// Forgets the editor once its window has closed, so the next pause
    /// registers handlers again.
    ///
    /// Only the instance that closed is forgotten; a late event for an
    /// earlier editor with the same label leaves the current one alone.
    pub fn on_window_event(&mut self, event: &WindowEvent) {
        let WindowEvent::Closed { handle } = event else {
            return;
        };
        if self.editor.as_ref() != Some(handle) {
            if self.editor() == Some(&handle.label) {
                debug!(label = %handle.label, id = %handle.id, "close of an earlier pause editor");
            }
            return;
        }
        if let Some(mut inbox) = self.inbox.take() {
            self.apply_queued(&mut inbox);
        }
        info!(label = %handle.label, paused = self.paused.len(), "pause editor closed");
        self.editor = None;
    }

    /// Next message from the editor.
    ///
    /// Pending forever while no editor handlers are registered; `None` once
    /// the bus is gone.
    pub async fn next_editor_message(&mut self) -> Option<BusEnvelope> {
        match self.inbox.as_mut() {
            Some(inbox) => inbox.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Applies every editor message already queued. Returns how many.
    pub fn drain_editor_messages(&mut self) -> usize {
        let mut handled = 0;
        while let Some(envelope) = self.inbox.as_mut().and_then(Inbox::try_recv) {
            self.handle_editor_message(envelope);
            handled += 1;
        }
        handled
    }

    fn apply_queued(&mut self, inbox: &mut Inbox) -> usize {
        let mut handled = 0;
        while let Some(envelope) = inbox.try_recv() {
            self.handle_editor_message(envelope);
            handled += 1;
        }
        handled
    }

    fn broadcast_snapshot(&self) {
        let message = PipelineMessage::BreakpointSnapshot {
            entries: self.paused.clone(),
        };
        let delivered = match &self.editor {
            Some(editor) => self.bus.emit_to(&self.owner, &editor.label, message),
            None => self.bus.emit(&self.owner, message),
        };
        if !delivered {
            debug!(entries = self.paused.len(), "snapshot had no listeners");
        }
    }
}

// ============================================================================
// Editor-window side
// ============================================================================

/// State and actions of the pause editor window.
///
/// Each outcome is sent to the backend first; only once the backend took
/// it is the main window told to drop the entry.
pub struct PauseEditor {
    label: WindowLabel,
    bus: MessageBus,
    inbox: Inbox,
    backend: Arc<dyn Backend>,
    entries: PausedTable,
}

impl std::fmt::Debug for PauseEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PauseEditor")
            .field("label", &self.label)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl PauseEditor {
    pub fn new(label: WindowLabel, bus: MessageBus, backend: Arc<dyn Backend>) -> Self {
        let inbox = bus.listen_to(&label);
        Self {
            label,
            bus,
            inbox,
            backend,
            entries: PausedTable::new(),
        }
    }

    pub fn label(&self) -> &WindowLabel {
        &self.label
    }

    /// The last snapshot received.
    pub fn entries(&self) -> &PausedTable {
        &self.entries
    }

    /// Asks the main window for the current snapshot.
    pub fn open(&self) {
        self.bus.emit(&self.label, PipelineMessage::Open);
    }

    /// Waits for the next snapshot and replaces the view with it.
    ///
    /// Returns false once the bus is gone.
    pub async fn sync(&mut self) -> bool {
        while let Some(envelope) = self.inbox.recv().await {
            if let PipelineMessage::BreakpointSnapshot { entries } = envelope.message {
                self.entries = entries;
                return true;
            }
        }
        false
    }

    /// Forwards `key` unmodified.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the main window is not told then.
    pub async fn send(&self, key: PauseKey) -> Result<(), BackendError> {
        self.backend
            .debugger_command(DebuggerCommand::Continue {
                id: key.as_str().to_string(),
            })
            .await?;
        self.bus.emit(&self.label, PipelineMessage::Send { key });
        Ok(())
    }

    /// Forwards an edited version of the entry named by `modification.id`.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the main window is not told then.
    pub async fn modify(&self, modification: TrafficModification) -> Result<(), BackendError> {
        let key = PauseKey::new(modification.id.clone());
        self.backend
            .debugger_command(DebuggerCommand::ModifyTraffic(modification))
            .await?;
        self.bus
            .emit(&self.label, PipelineMessage::Modification { key });
        Ok(())
    }

    /// Replays the edited entry as a new request.
    ///
    /// # Errors
    ///
    /// Returns the backend failure; the main window is not told then.
    pub async fn resend(&self, modification: TrafficModification) -> Result<(), BackendError> {
        let key = PauseKey::new(modification.id.clone());
        self.backend.resend(modification).await?;
        self.bus.emit(&self.label, PipelineMessage::Resend { key });
        Ok(())
    }
}
