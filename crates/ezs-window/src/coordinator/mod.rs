//! Window lifecycle coordinator using the actor pattern.
//!
//! ```text
//! ┌───────────────┐  CoordinatorCommand  ┌──────────────────┐  WindowEvent  ┌─────────────┐
//! │ WindowClient  │─────────────────────▶│ CoordinatorActor │──────────────▶│ subscribers │
//! │ (any window)  │    (mpsc channel)    │ (main process)   │  (broadcast)  │ (main side) │
//! └───────────────┘                      └──────────────────┘               └─────────────┘
//!                                                 │
//!                                                 ▼
//!                                        WindowRegistry + WindowHost
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::CoordinatorActor;
pub use commands::{CoordinatorCommand, CreatedWindow, WindowEvent};
pub use handle::CoordinatorHandle;

use crate::host::WindowHost;

const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawns the coordinator actor on the current runtime and returns a handle.
///
/// Must be called from inside the main process; the registry starts with
/// the host's main window.
pub fn spawn_coordinator(host: Arc<dyn WindowHost>) -> CoordinatorHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = CoordinatorActor::new(cmd_rx, host, event_tx.clone());
    tokio::spawn(actor.run());

    CoordinatorHandle::new(cmd_tx, event_tx)
}
