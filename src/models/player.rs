use serde::{Deserialize, Serialize};
use std::fmt;

use super::role::{SpecialRole, TeamTag};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn generate() -> Self {
        PlayerId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        PlayerId(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub is_host: bool,
    pub score: u32,
    // Round-scoped fields, only meaningful from ROLE_REVEAL to RESULTS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<TeamTag>,
    #[serde(default)]
    pub is_outsider: bool,
    #[serde(default)]
    pub special_role: SpecialRole,
    #[serde(default)]
    pub had_special_role: bool,
    #[serde(default)]
    pub was_joker: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            avatar: avatar.into(),
            is_host: false,
            score: 0,
            word: None,
            role: None,
            is_outsider: false,
            special_role: SpecialRole::Normal,
            had_special_role: false,
            was_joker: false,
        }
    }

    pub fn host(id: PlayerId, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            is_host: true,
            ..Self::new(id, name, avatar)
        }
    }

    pub fn is_mute(&self) -> bool {
        self.special_role == SpecialRole::Mute
    }

    /// Drops everything tied to the finished game. The score survives.
    pub fn clear_round_fields(&mut self) {
        self.word = None;
        self.role = None;
        self.is_outsider = false;
        self.special_role = SpecialRole::Normal;
        self.had_special_role = false;
        self.was_joker = false;
    }
}
