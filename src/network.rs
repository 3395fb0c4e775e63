pub mod connection;
pub mod directory;
pub mod local;
pub mod ws_client;
pub mod ws_host;

pub use connection::{ConnectionLayer, Inbound, NetworkError};
pub use directory::{LinkId, RoomDirectory, HOST_LINK};
