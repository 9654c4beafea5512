//! Client interface for the CoordinatorActor.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors map to `WindowError::ChannelClosed`
//! - Queries degrade to `false` / `None` / empty once the actor is gone

use tokio::sync::{broadcast, mpsc, oneshot};

use ezs_core::{WindowLabel, WindowTarget};
use ezs_protocol::WindowMessage;

use super::commands::{CoordinatorCommand, CreatedWindow, WindowEvent};
use crate::error::WindowError;
use crate::host::WindowOverrides;
use crate::registry::WindowDescriptor;

/// Cheap-to-clone handle to the coordinator actor.
///
/// Every window holds one; only the actor behind it touches the registry.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorCommand>,
    event_sender: broadcast::Sender<WindowEvent>,
}

impl std::fmt::Debug for CoordinatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorHandle").finish_non_exhaustive()
    }
}

impl CoordinatorHandle {
    pub fn new(
        sender: mpsc::Sender<CoordinatorCommand>,
        event_sender: broadcast::Sender<WindowEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Opens the window for `target` as requested by `caller`, or focuses it
    /// when it is already open.
    ///
    /// # Errors
    ///
    /// - `WindowError::Host` if the native window could not be created
    /// - `WindowError::ChannelClosed` if the actor has shut down
    pub async fn create_window(
        &self,
        caller: &WindowLabel,
        target: WindowTarget,
        overrides: WindowOverrides,
    ) -> Result<CreatedWindow, WindowError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::CreateWindow {
                caller: caller.clone(),
                target,
                overrides,
                respond_to: tx,
            })
            .await
            .map_err(|_| WindowError::ChannelClosed)?;

        rx.await.map_err(|_| WindowError::ChannelClosed)?
    }

    /// Returns true if the window `caller` would get for `target` is open.
    pub async fn has_window(&self, caller: &WindowLabel, target: WindowTarget) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(CoordinatorCommand::HasWindow {
                caller: caller.clone(),
                target,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Delivers a lifecycle message to the main process (fire-and-forget).
    ///
    /// # Errors
    ///
    /// - `WindowError::ChannelClosed` if the actor has shut down
    pub async fn send_message(&self, message: WindowMessage) -> Result<(), WindowError> {
        self.sender
            .send(CoordinatorCommand::Message(message))
            .await
            .map_err(|_| WindowError::ChannelClosed)
    }

    pub async fn descriptor(&self, label: &WindowLabel) -> Option<WindowDescriptor> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(CoordinatorCommand::GetDescriptor {
                label: label.clone(),
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok().flatten()
    }

    /// Labels of every tracked window, sorted.
    pub async fn windows(&self) -> Vec<WindowLabel> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(CoordinatorCommand::ListWindows { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribes to window lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.event_sender.subscribe()
    }
}
