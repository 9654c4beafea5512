//! Per-window view of the coordinator.
//!
//! A [`WindowClient`] is what code running inside one window uses: it knows
//! its own label, opens windows on its own behalf (so the coordinator can
//! inject `parentWindowId`) and owns that window's close gates.

use std::time::Duration;

use tracing::{debug, info};

use ezs_core::{QueryParams, WindowLabel, WindowTarget};
use ezs_protocol::WindowMessage;

use crate::coordinator::{CoordinatorHandle, CreatedWindow};
use crate::error::WindowError;
use crate::gate::{CloseGate, CloseGateChain, GateResult, DEFAULT_GATE_TIMEOUT};
use crate::host::WindowOverrides;

// ============================================================================
// Child bootstrap
// ============================================================================

/// Start-up state of a child window before it has announced itself.
///
/// [`announce`](Self::announce) consumes the bootstrap, so a window can only
/// announce once.
#[derive(Debug)]
pub struct ChildBootstrap {
    label: WindowLabel,
    params: QueryParams,
}

impl ChildBootstrap {
    /// Recovers label and parameters from the URL the window was opened with.
    pub fn from_url(label: WindowLabel, url: &str) -> Self {
        Self {
            label,
            params: QueryParams::parse(url),
        }
    }

    pub fn label(&self) -> &WindowLabel {
        &self.label
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn parent(&self) -> Option<WindowLabel> {
        self.params.parent_window()
    }

    /// Tells the main process this window is alive.
    ///
    /// # Errors
    ///
    /// - `WindowError::ChannelClosed` if the coordinator has shut down
    pub async fn announce(
        self,
        coordinator: CoordinatorHandle,
        gate_timeout: Duration,
    ) -> Result<WindowClient, WindowError> {
        let parent_label = self.parent();
        coordinator
            .send_message(WindowMessage::Created {
                label: self.label.clone(),
                parent_label: parent_label.clone(),
            })
            .await?;
        debug!(label = %self.label, parent = ?parent_label, "window announced");

        Ok(WindowClient {
            label: self.label,
            params: self.params,
            coordinator,
            gates: CloseGateChain::new(gate_timeout),
        })
    }
}

// ============================================================================
// Window client
// ============================================================================

/// Handle used by code running inside one window.
#[derive(Debug)]
pub struct WindowClient {
    label: WindowLabel,
    params: QueryParams,
    coordinator: CoordinatorHandle,
    gates: CloseGateChain,
}

impl WindowClient {
    /// Client for the main window, which never announces itself.
    pub fn main(coordinator: CoordinatorHandle) -> Self {
        Self::main_with_timeout(coordinator, DEFAULT_GATE_TIMEOUT)
    }

    pub fn main_with_timeout(coordinator: CoordinatorHandle, gate_timeout: Duration) -> Self {
        Self {
            label: WindowLabel::main(),
            params: QueryParams::default(),
            coordinator,
            gates: CloseGateChain::new(gate_timeout),
        }
    }

    pub fn label(&self) -> &WindowLabel {
        &self.label
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Opens `target` as a child of this window, or focuses it when open.
    ///
    /// # Errors
    ///
    /// - `WindowError::Host` if the native window could not be created
    /// - `WindowError::ChannelClosed` if the coordinator has shut down
    pub async fn create_window(
        &self,
        target: WindowTarget,
        overrides: WindowOverrides,
    ) -> Result<CreatedWindow, WindowError> {
        self.coordinator
            .create_window(&self.label, target, overrides)
            .await
    }

    pub async fn has_window(&self, target: WindowTarget) -> bool {
        self.coordinator.has_window(&self.label, target).await
    }

    pub fn add_close_gate(&mut self, gate: impl CloseGate + 'static) {
        self.gates.register(gate);
    }

    pub fn add_close_gate_fn<F, Fut>(&mut self, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = GateResult> + Send + 'static,
    {
        self.gates.register_fn(f);
    }

    pub fn close_gates(&self) -> &CloseGateChain {
        &self.gates
    }

    /// Runs this window's close gates and, if they all pass, asks the main
    /// process to close the window and its descendants.
    ///
    /// Returns `Ok(false)` when a gate vetoed; nothing is closed then.
    ///
    /// # Errors
    ///
    /// - `WindowError::ChannelClosed` if the coordinator has shut down
    pub async fn request_close(&mut self) -> Result<bool, WindowError> {
        if let Err(e) = self.gates.run().await {
            info!(label = %self.label, reason = %e, "close vetoed");
            return Ok(false);
        }

        self.coordinator
            .send_message(WindowMessage::CloseRequested {
                label: self.label.clone(),
            })
            .await?;
        Ok(true)
    }
}
