//! Coordinator actor commands and events.
//!
//! - `CoordinatorCommand`: messages sent to the actor
//! - `CreatedWindow`: result of a create request
//! - `WindowEvent`: lifecycle events published to main-process subscribers

use tokio::sync::oneshot;

use ezs_core::{WindowLabel, WindowTarget};
use ezs_protocol::WindowMessage;

use crate::error::WindowError;
use crate::host::{WindowHandle, WindowOverrides};
use crate::registry::WindowDescriptor;

// ============================================================================
// Commands
// ============================================================================

/// Commands sent to the coordinator actor.
#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Open (or focus) the window for `target` on behalf of `caller`.
    CreateWindow {
        caller: WindowLabel,
        target: WindowTarget,
        overrides: WindowOverrides,
        respond_to: oneshot::Sender<Result<CreatedWindow, WindowError>>,
    },

    /// Whether the window `caller` would get for `target` is alive.
    HasWindow {
        caller: WindowLabel,
        target: WindowTarget,
        respond_to: oneshot::Sender<bool>,
    },

    /// A lifecycle message from some window. Fire-and-forget.
    Message(WindowMessage),

    GetDescriptor {
        label: WindowLabel,
        respond_to: oneshot::Sender<Option<WindowDescriptor>>,
    },

    ListWindows {
        respond_to: oneshot::Sender<Vec<WindowLabel>>,
    },
}

// ============================================================================
// Replies
// ============================================================================

/// Result of a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWindow {
    pub handle: WindowHandle,
    pub label: WindowLabel,
    pub url: String,
    /// False when an existing window was focused instead.
    pub is_new: bool,
}

// ============================================================================
// Events
// ============================================================================

/// Lifecycle events published by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// A window announced itself and is now tracked.
    Created {
        label: WindowLabel,
        parent: Option<WindowLabel>,
    },

    /// A window was closed and removed from the registry.
    ///
    /// Labels are reused by later windows for the same target; the native
    /// id tells one instance from the next.
    Closed { handle: WindowHandle },
}

impl WindowEvent {
    pub fn label(&self) -> &WindowLabel {
        match self {
            Self::Created { label, .. } => label,
            Self::Closed { handle } => &handle.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NativeWindowId;

    #[test]
    fn test_window_event_label() {
        let event = WindowEvent::Closed {
            handle: WindowHandle::new(NativeWindowId::new(3), WindowLabel::new("child_-settings")),
        };
        assert_eq!(event.label().as_str(), "child_-settings");
        let _cloned = event.clone();
    }

    #[tokio::test]
    async fn test_dropped_responder_is_observable() {
        let (tx, rx) = oneshot::channel::<Result<CreatedWindow, WindowError>>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
