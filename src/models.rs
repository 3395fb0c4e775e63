pub mod cli;
pub mod config;
pub mod game;
pub mod message;
pub mod player;
pub mod role;
pub mod room;
pub mod word_pack;
