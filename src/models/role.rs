use serde::{Deserialize, Serialize};
use std::fmt;

/// Team a player belongs to for the current game. Players sharing a tag share
/// a secret word; the outsider tag is held by exactly one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamTag {
    A,
    B,
    C,
    Outsider,
}

impl TeamTag {
    /// Tags available to regular teams, in assignment order.
    pub const TEAMS: [TeamTag; 3] = [TeamTag::A, TeamTag::B, TeamTag::C];
}

impl fmt::Display for TeamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamTag::A => write!(f, "A"),
            TeamTag::B => write!(f, "B"),
            TeamTag::C => write!(f, "C"),
            TeamTag::Outsider => write!(f, "Outsider"),
        }
    }
}

/// One-round ability handed out by the gift draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialRole {
    #[default]
    Normal,
    Mute,  // skipped in turn order, gives no hint
    Joker, // earns points for every accusation against them
    Actor,
}

impl SpecialRole {
    pub const GIFTS: [SpecialRole; 3] = [SpecialRole::Mute, SpecialRole::Joker, SpecialRole::Actor];

    pub fn is_gift(&self) -> bool {
        !matches!(self, SpecialRole::Normal)
    }
}

impl fmt::Display for SpecialRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialRole::Normal => write!(f, "Normal"),
            SpecialRole::Mute => write!(f, "Mute"),
            SpecialRole::Joker => write!(f, "Joker"),
            SpecialRole::Actor => write!(f, "Actor"),
        }
    }
}
