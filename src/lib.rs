pub mod app;
pub mod models;
pub mod network;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
