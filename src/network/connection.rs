use std::future::Future;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::models::{message::NetworkMessage, room::RoomCode};
use crate::network::directory::LinkId;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("room {0} is already taken")]
    RoomTaken(RoomCode),
    #[error("room {0} was not found")]
    RoomNotFound(RoomCode),
    #[error("timed out while connecting")]
    Timeout,
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("not connected to a room")]
    NotConnected,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0} is not available on this side of the link")]
    Unsupported(&'static str),
}

/// What a session hears from its links.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message { from: LinkId, message: NetworkMessage },
    Closed(LinkId),
}

/// Transport between one host and its clients. The host side relays every
/// frame it receives to all other links before handing it to the session.
pub trait ConnectionLayer: Send + 'static {
    /// Opens `room` for incoming links.
    fn listen(&mut self, room: &RoomCode) -> impl Future<Output = Result<(), NetworkError>> + Send;

    /// Opens a link to the host of `room`.
    fn connect(&mut self, room: &RoomCode)
        -> impl Future<Output = Result<(), NetworkError>> + Send;

    /// Sends to every open link. For a client that is the host alone.
    fn send(&self, message: &NetworkMessage) -> Result<(), NetworkError>;

    /// Inbound events. Yields the receiver once.
    fn subscribe(&mut self) -> Option<UnboundedReceiver<Inbound>>;

    fn disconnect(&mut self);
}
