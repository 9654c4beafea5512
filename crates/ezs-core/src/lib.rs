//! ezshark Core - Shared domain types for the traffic debugger front-end
//!
//! This crate provides the value types shared between the window
//! coordinator (`ezs-window`) and the inspector state (`ezs-inspector`):
//! window identity and label derivation, logical sessions, and captured
//! traffic records.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod pause;
pub mod session;
pub mod traffic;
pub mod window;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use pause::PauseKey;
pub use session::{Session, SessionId, DEFAULT_SESSION_ID, DEFAULT_SESSION_LABEL};
pub use traffic::{PhaseFields, TrafficId, TrafficPhase, TrafficRecord, TransactionState};
pub use window::{
    ParamValue, QueryParams, WindowLabel, WindowParams, WindowTarget, LABEL_MAX_LEN, LABEL_PREFIX,
    MAIN_WINDOW_LABEL, PARENT_WINDOW_PARAM,
};
