use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::game::GamePhase;

/// Four digit numeric room identifier announced by the host.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        RoomCode(rng.gen_range(1000..=9999u32).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomCode {
    fn from(value: &str) -> Self {
        RoomCode(value.to_string())
    }
}

/// What the HTTP probe reports about a hosted room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_code: RoomCode,
    /// Clients currently attached to the host.
    pub links: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<GamePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<usize>,
}
