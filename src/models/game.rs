use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{
    config::GameConfig,
    player::{Player, PlayerId},
    role::TeamTag,
    room::RoomCode,
    word_pack::WordPack,
};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Home, // not in a room
    Lobby,
    RoleReveal,
    GameRound,
    Voting,
    Results,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub player_id: PlayerId,
    pub round: u32,
    pub text: String,
    #[serde(default)]
    pub placeholder: bool,
    pub submitted_at: DateTime<Utc>,
}

impl Hint {
    pub fn new(player_id: PlayerId, round: u32, text: String, submitted_at: DateTime<Utc>) -> Self {
        Hint {
            player_id,
            round,
            text,
            placeholder: false,
            submitted_at,
        }
    }

    pub fn timed_out(player_id: PlayerId, round: u32, submitted_at: DateTime<Utc>) -> Self {
        Hint {
            placeholder: true,
            ..Hint::new(player_id, round, "(passed)".to_string(), submitted_at)
        }
    }
}

/// A voter's accusation plus who they think shares their word. `None` as the
/// teammate means "I have no teammate".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotePayload {
    pub accused_outsider_id: PlayerId,
    pub claimed_teammate_id: Option<PlayerId>,
}

/// Result of the vote, committed together with the score changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyOutcome {
    pub accusations: BTreeMap<PlayerId, u32>,
    pub total_accusations: u32,
    pub executed: Option<PlayerId>,
    pub outsider_id: Option<PlayerId>,
    pub outsider_caught: bool,
    /// Raw per-player change before flooring at zero.
    pub deltas: BTreeMap<PlayerId, i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub room_code: RoomCode,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub config: GameConfig,
    pub current_round: u32,
    pub turn_order: Vec<PlayerId>,
    pub turn_index: usize,
    pub current_turn_player_id: Option<PlayerId>,
    pub timer: u32,
    pub hints: Vec<Hint>,
    pub votes: BTreeMap<PlayerId, VotePayload>,
    pub winners: BTreeSet<PlayerId>,
    pub word_pack: Option<WordPack>,
    pub words: BTreeMap<TeamTag, String>,
    pub used_word_pack_indices: Vec<usize>,
    pub ready_players: BTreeSet<PlayerId>,
    #[serde(default)]
    pub tally: Option<TallyOutcome>,
    #[serde(default)]
    pub disconnected: BTreeSet<PlayerId>,
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            room_code: RoomCode::default(),
            phase: GamePhase::Home,
            players: Vec::new(),
            config: GameConfig::default(),
            current_round: 1,
            turn_order: Vec::new(),
            turn_index: 0,
            current_turn_player_id: None,
            timer: 0,
            hints: Vec::new(),
            votes: BTreeMap::new(),
            winners: BTreeSet::new(),
            word_pack: None,
            words: BTreeMap::new(),
            used_word_pack_indices: Vec::new(),
            ready_players: BTreeSet::new(),
            tally: None,
            disconnected: BTreeSet::new(),
        }
    }
}

impl GameState {
    /// A freshly opened room holding only the local player.
    pub fn lobby(room_code: RoomCode, first_player: Player, config: GameConfig) -> Self {
        GameState {
            room_code,
            phase: GamePhase::Lobby,
            players: vec![first_player],
            config,
            ..GameState::default()
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn outsider(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_outsider)
    }

    pub fn is_mute(&self, id: &PlayerId) -> bool {
        self.player(id).map(|p| p.is_mute()).unwrap_or(false)
    }

    pub fn has_hint(&self, id: &PlayerId, round: u32) -> bool {
        self.hints
            .iter()
            .any(|h| &h.player_id == id && h.round == round)
    }

    pub fn hints_for_round(&self, round: u32) -> impl Iterator<Item = &Hint> {
        self.hints.iter().filter(move |h| h.round == round)
    }

    /// Turn order members able to speak this round.
    pub fn speaking_players(&self) -> impl Iterator<Item = &PlayerId> {
        self.turn_order.iter().filter(move |id| !self.is_mute(id))
    }

    pub fn all_ready(&self) -> bool {
        self.players
            .iter()
            .all(|p| self.ready_players.contains(&p.id))
    }

    pub fn all_voted(&self) -> bool {
        self.players.iter().all(|p| self.votes.contains_key(&p.id))
    }
}
