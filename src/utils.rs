pub mod config;
pub mod entropy;
pub mod test_setup;
pub mod websocket;
