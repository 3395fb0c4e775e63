use once_cell::sync::Lazy;

use crate::models::config::ServerConfig;

/// Settings read once from the environment (and `.env`) on first use.
pub static CONFIG: Lazy<ServerConfig> = Lazy::new(ServerConfig::from_env);
