//! WebSocket transport: frame types and the per-connection socket loop.

mod handler;
mod message;

pub use handler::ws_handler;
pub use message::{ClientMessage, ServerMessage, TypingPayload};
