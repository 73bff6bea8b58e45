pub mod client;
pub mod server;

pub use client::{Action, ClientMessage, RequestHeader, RequestPayload, Streaming};
pub use server::{ErrorDetails, EventHeader, EventName, EventPayload, ServerEvent, ServerMessage};
