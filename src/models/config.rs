use serde::{Deserialize, Serialize};
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

/// Rules the host picks in the lobby. Replicated to every client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub max_rounds: u32,
    /// Seconds each player gets for a hint.
    pub round_duration_base: u32,
    #[serde(default)]
    pub include_special_roles: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            round_duration_base: 20,
            include_special_roles: false,
        }
    }
}

impl GameConfig {
    pub fn is_valid(&self) -> bool {
        self.max_rounds > 0 && self.round_duration_base > 0
    }
}

/// Process level settings. Loaded from `OUTSIDER_*` variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    // 1 Hz turn clock
    pub tick_interval: Duration,
    // quiet period before a full state broadcast
    pub sync_debounce: Duration,
    // pause between the last vote and the score reveal
    pub reveal_delay: Duration,
    pub connect_timeout: Duration,
    // wait before a fresh client announces itself
    pub join_settle_delay: Duration,
    pub room_code_attempts: u32,
    pub default_game: GameConfig,
    pub word_packs_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            tick_interval: Duration::from_millis(1000),
            sync_debounce: Duration::from_millis(50),
            reveal_delay: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(5000),
            join_settle_delay: Duration::from_millis(500),
            room_code_attempts: 3,
            default_game: GameConfig::default(),
            word_packs_path: None,
            seed: None,
        }
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env::var("OUTSIDER_BIND_ADDR")
            .ok()
            .and_then(|v| v.parse::<SocketAddr>().ok())
            .unwrap_or(defaults.bind_addr);
        let tick_interval = env_millis("OUTSIDER_TICK_MS", defaults.tick_interval);
        let sync_debounce = env_millis("OUTSIDER_SYNC_DEBOUNCE_MS", defaults.sync_debounce);
        let reveal_delay = env_millis("OUTSIDER_REVEAL_DELAY_MS", defaults.reveal_delay);
        let connect_timeout = env_millis("OUTSIDER_CONNECT_TIMEOUT_MS", defaults.connect_timeout);
        let join_settle_delay = env_millis("OUTSIDER_JOIN_SETTLE_MS", defaults.join_settle_delay);
        let room_code_attempts = env::var("OUTSIDER_ROOM_CODE_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.room_code_attempts);
        let max_rounds = env::var("OUTSIDER_MAX_ROUNDS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.default_game.max_rounds);
        let round_duration_base = env::var("OUTSIDER_ROUND_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.default_game.round_duration_base);
        let include_special_roles = env::var("OUTSIDER_SPECIAL_ROLES")
            .map(|v| v == "true")
            .unwrap_or(defaults.default_game.include_special_roles);
        let word_packs_path = env::var("OUTSIDER_WORD_PACKS").ok().map(PathBuf::from);
        let seed = env::var("OUTSIDER_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        Self {
            bind_addr,
            tick_interval,
            sync_debounce,
            reveal_delay,
            connect_timeout,
            join_settle_delay,
            room_code_attempts,
            default_game: GameConfig {
                max_rounds,
                round_duration_base,
                include_special_roles,
            },
            word_packs_path,
            seed,
        }
    }
}
