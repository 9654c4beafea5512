//! ezshark Protocol - Wire types for process boundaries
//!
//! This crate provides the message types crossing the three boundaries the
//! front-end talks over:
//! - backend invocation (`command`): requests and `"Success"`/`"Fail"` replies
//! - backend push (`message::BackendPush`): unsolicited traffic and pause events
//! - cross-window messages (`message::WindowMessage`, `message::PipelineMessage`)

pub mod command;
pub mod error;
pub mod message;
pub mod parse;

pub use command::{
    BackendReply, Breakpoint, BreakpointConditions, BreakpointsConfig, DebuggerCommand,
    ReplyMarker, RequestMatch, ResponseMatch, SearchData, SearchItem, SearchPosition, SearchQuery,
    SearchResult, TrafficModification,
};
pub use error::ProtocolError;
pub use message::{
    BackendPush, Payload, PayloadStatus, PipelineMessage, WindowMessage, NEW_TRAFFIC_EVENT,
    PAUSE_TRAFFIC_EVENT, RESEND_TRAFFIC_EVENT,
};
pub use parse::{BodyContent, HeaderItem, Headers, PauseKind, PausedTraffic, PausedTransaction, RawTraffic};
