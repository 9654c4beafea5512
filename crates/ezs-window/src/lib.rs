//! ezshark window coordination.
//!
//! The main process owns a [`WindowRegistry`] inside the coordinator actor
//! and is the only place native windows are created or closed. Every other
//! window talks to it through a [`CoordinatorHandle`]:
//!
//! - children announce themselves once on start-up ([`ChildBootstrap`])
//! - closing is always a request, checked first by the requesting window's
//!   [`CloseGateChain`] and then carried out children-first by the actor
//! - pipeline broadcasts between windows travel over the [`MessageBus`]
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod bus;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod host;
pub mod registry;

pub use bus::{BusEnvelope, Inbox, MessageBus};
pub use client::{ChildBootstrap, WindowClient};
pub use coordinator::{
    spawn_coordinator, CoordinatorActor, CoordinatorCommand, CoordinatorHandle, CreatedWindow,
    WindowEvent,
};
pub use error::{CloseGateError, WindowError};
pub use gate::{CloseGate, CloseGateChain, FnGate, GateResult, DEFAULT_GATE_TIMEOUT};
pub use host::{
    HeadlessHost, HeadlessWindow, NativeWindowId, WindowHandle, WindowHost, WindowOptions,
    WindowOverrides,
};
pub use registry::{WindowDescriptor, WindowRegistry};
