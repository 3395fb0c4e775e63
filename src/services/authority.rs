use chrono::Utc;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::debug;

use crate::models::{
    config::GameConfig,
    game::{GamePhase, GameState, Hint},
    message::NetworkMessage,
    player::{Player, PlayerId},
    room::RoomCode,
};
use crate::services::{
    game_service::{self, Effect, Intent, Rejection},
    word_pack_registry::WordPackRegistry,
};

/// The host's copy of the game. Owning one is what makes a process the host:
/// every mutating operation lives here and nowhere else.
pub struct Authority {
    state: GameState,
    registry: Arc<WordPackRegistry>,
    rng: StdRng,
    local_player: PlayerId,
}

impl Authority {
    /// Opens a lobby with the host as its only player.
    pub fn open(
        room_code: RoomCode,
        host: Player,
        config: GameConfig,
        registry: Arc<WordPackRegistry>,
        rng: StdRng,
    ) -> Self {
        let local_player = host.id.clone();
        Authority {
            state: GameState::lobby(room_code, host, config),
            registry,
            rng,
            local_player,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn local_player(&self) -> &PlayerId {
        &self.local_player
    }

    /// Runs one intent through the reducer and commits the result.
    pub fn dispatch(&mut self, intent: Intent) -> Result<Vec<Effect>, Rejection> {
        let transition =
            game_service::reduce(&self.state, &intent, &self.registry, &mut self.rng)?;
        self.state = transition.state;
        Ok(transition.effects)
    }
}

/// A client's read-only view. It absorbs host broadcasts and may guess ahead
/// on relayed intents, but the next sync always replaces it wholesale.
#[derive(Debug, Clone)]
pub struct Replica {
    mirror: GameState,
    local_player: PlayerId,
}

impl Replica {
    /// Mirror right after a successful connect, before any sync arrived.
    pub fn joined(room_code: RoomCode, me: Player, config: GameConfig) -> Self {
        let local_player = me.id.clone();
        Replica {
            mirror: GameState::lobby(room_code, me, config),
            local_player,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.mirror
    }

    pub fn local_player(&self) -> &PlayerId {
        &self.local_player
    }

    pub fn apply_sync(&mut self, state: GameState) {
        self.mirror = state;
    }

    /// Absorbs one inbound message. Returns whether the mirror changed.
    pub fn absorb(&mut self, message: &NetworkMessage) -> bool {
        match message {
            NetworkMessage::SyncState(state) => {
                let changed = self.mirror != **state;
                self.apply_sync((**state).clone());
                changed
            }
            NetworkMessage::Restart => {
                debug!(room = %self.mirror.room_code, "host restarted the game");
                false
            }
            other => self.predict(other),
        }
    }

    /// Speculative local update. Turn order, timers and scoring stay with
    /// the host, so only the obvious bookkeeping is mirrored.
    pub fn predict(&mut self, message: &NetworkMessage) -> bool {
        let mirror = &mut self.mirror;
        match message {
            NetworkMessage::Join(player) => {
                if mirror.phase != GamePhase::Lobby || mirror.has_player(&player.id) {
                    return false;
                }
                mirror.players.push(player.clone());
                true
            }
            NetworkMessage::UpdateSettings(config) => {
                if mirror.phase != GamePhase::Lobby || mirror.config == *config {
                    return false;
                }
                mirror.config = *config;
                true
            }
            NetworkMessage::EndTurn(p) => {
                if mirror.phase != GamePhase::GameRound
                    || mirror.has_hint(&p.player_id, mirror.current_round)
                {
                    return false;
                }
                let round = mirror.current_round;
                mirror
                    .hints
                    .push(Hint::new(p.player_id.clone(), round, p.text.trim().to_string(), Utc::now()));
                true
            }
            NetworkMessage::SubmitVote(p) => {
                if mirror.phase != GamePhase::Voting || mirror.votes.get(&p.voter_id) == Some(&p.vote)
                {
                    return false;
                }
                mirror.votes.insert(p.voter_id.clone(), p.vote.clone());
                true
            }
            NetworkMessage::PlayerReady(id) => {
                mirror.phase == GamePhase::RoleReveal && mirror.ready_players.insert(id.clone())
            }
            NetworkMessage::SyncState(_) | NetworkMessage::Restart => false,
        }
    }

    /// Back to the home screen after leaving the room.
    pub fn leave(&mut self) {
        self.mirror.phase = GamePhase::Home;
        self.mirror.room_code = RoomCode::default();
        self.mirror.players.clear();
    }
}
