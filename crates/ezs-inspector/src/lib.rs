//! ezshark inspector state.
//!
//! Everything the main window keeps besides its windows:
//!
//! - [`settings`]: the durable key-value store, cached by an actor
//! - [`SessionStore`]: session tabs plus the displayed and monitored pointers
//! - [`TrafficPipeline`]: per-session traffic tables fed by backend pushes
//! - [`BreakpointOrchestrator`]: paused traffic and the pause editor window
//! - [`SearchOverlay`]: highlighted search results over the live tables
//! - [`BreakpointBook`]: user-maintained breakpoint definitions
//!
//! [`Inspector`] ties them together behind the [`Backend`] seam.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod backend;
pub mod breakpoints;
pub mod config;
pub mod error;
pub mod inspector;
pub mod orchestrator;
pub mod search;
pub mod session;
pub mod settings;
pub mod traffic;

pub use backend::{Backend, ImportKind, OfflineBackend};
pub use breakpoints::BreakpointBook;
pub use config::InspectorConfig;
pub use error::{BackendError, ConfigError, InspectorError, SettingsError};
pub use inspector::Inspector;
pub use orchestrator::{BreakpointOrchestrator, PauseEditor, PausedTable, PAUSE_EDITOR_URL};
pub use search::{highlight, SearchOverlay, SearchRow, SearchTable};
pub use session::SessionStore;
pub use settings::{spawn_settings, JsonFileBackend, MemoryBackend, SettingsBackend, SettingsHandle};
pub use traffic::{TrafficPipeline, TrafficTable};
