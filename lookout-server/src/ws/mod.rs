//! WebSocket module for viewer sessions

mod connection;
mod protocol;

pub use connection::ws_handler;
pub use protocol::{ClientMessage, RecordingState, ServerMessage};
