use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::models::{
    config::GameConfig,
    game::{GamePhase, GameState, VotePayload},
    message::{EndTurnPayload, NetworkMessage, SubmitVotePayload},
    player::{Player, PlayerId},
};
use crate::services::{role_service, turn_service, vote_service, word_pack_registry::WordPackRegistry};

pub const MIN_PLAYERS: usize = 3;

/// Why the host refused an intent. The state is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("not allowed during {0:?}")]
    WrongPhase(GamePhase),
    #[error("at least 3 players are needed, the room has {0}")]
    NotEnoughPlayers(usize),
    #[error("the player count must be odd, the room has {0}")]
    EvenPlayerCount(usize),
    #[error("only the host may act as {0}")]
    NotHost(PlayerId),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),
    #[error("player {0} is already ready")]
    AlreadyReady(PlayerId),
    #[error("player {player} already gave a hint in round {round}")]
    DuplicateHint { player: PlayerId, round: u32 },
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),
    #[error("player {0} is muted this round")]
    Muted(PlayerId),
    #[error("identical vote from {0} already recorded")]
    DuplicateVote(PlayerId),
    #[error("votes were already tallied")]
    AlreadyTallied,
    #[error("votes are still missing")]
    VotesPending,
    #[error("rounds and round duration must both be positive")]
    InvalidConfig,
    #[error("the turn clock is not running")]
    ClockStopped,
}

impl Rejection {
    /// Duplicates are expected under at-least-once delivery and are not worth
    /// more than a debug line.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Rejection::AlreadyJoined(_)
                | Rejection::AlreadyReady(_)
                | Rejection::DuplicateHint { .. }
                | Rejection::DuplicateVote(_)
        )
    }
}

/// Everything that can change the canonical state.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Join(Player),
    UpdateSettings(GameConfig),
    StartGame,
    PlayerReady(PlayerId),
    EndTurn {
        player_id: PlayerId,
        text: String,
        at: DateTime<Utc>,
    },
    /// One beat of the turn clock, stamped by the session that runs it.
    Tick(DateTime<Utc>),
    SubmitVote { voter_id: PlayerId, vote: VotePayload },
    RevealResults,
    Restart,
    PlayerDisconnected(PlayerId),
}

impl Intent {
    /// Intents a peer may ask for over the wire, stamped with the host's
    /// receive time. Host-only actions and host broadcasts have no counterpart.
    pub fn from_message(message: &NetworkMessage, at: DateTime<Utc>) -> Option<Intent> {
        match message {
            NetworkMessage::Join(player) => Some(Intent::Join(player.clone())),
            NetworkMessage::UpdateSettings(config) => Some(Intent::UpdateSettings(*config)),
            NetworkMessage::EndTurn(p) => Some(Intent::EndTurn {
                player_id: p.player_id.clone(),
                text: p.text.clone(),
                at,
            }),
            NetworkMessage::SubmitVote(p) => Some(Intent::SubmitVote {
                voter_id: p.voter_id.clone(),
                vote: p.vote.clone(),
            }),
            NetworkMessage::PlayerReady(id) => Some(Intent::PlayerReady(id.clone())),
            NetworkMessage::SyncState(_) | NetworkMessage::Restart => None,
        }
    }

    /// The player on whose behalf the intent acts, if any.
    pub fn actor(&self) -> Option<&PlayerId> {
        match self {
            Intent::Join(player) => Some(&player.id),
            Intent::PlayerReady(id) | Intent::PlayerDisconnected(id) => Some(id),
            Intent::EndTurn { player_id, .. } => Some(player_id),
            Intent::SubmitVote { voter_id, .. } => Some(voter_id),
            _ => None,
        }
    }

    pub fn to_message(&self) -> Option<NetworkMessage> {
        match self {
            Intent::Join(player) => Some(NetworkMessage::Join(player.clone())),
            Intent::UpdateSettings(config) => Some(NetworkMessage::UpdateSettings(*config)),
            Intent::PlayerReady(id) => Some(NetworkMessage::PlayerReady(id.clone())),
            Intent::EndTurn { player_id, text, .. } => Some(NetworkMessage::EndTurn(EndTurnPayload {
                player_id: player_id.clone(),
                text: text.clone(),
            })),
            Intent::SubmitVote { voter_id, vote } => {
                Some(NetworkMessage::SubmitVote(SubmitVotePayload {
                    voter_id: voter_id.clone(),
                    vote: vote.clone(),
                }))
            }
            _ => None,
        }
    }
}

/// Follow-up work the runtime must schedule after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Scores are committed; move to RESULTS after the reveal delay.
    ScheduleReveal,
    /// Tell the replicas the game was reset.
    AnnounceRestart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: GameState,
    pub effects: Vec<Effect>,
}

fn require_phase(state: &GameState, phase: GamePhase) -> Result<(), Rejection> {
    if state.phase == phase {
        Ok(())
    } else {
        Err(Rejection::WrongPhase(state.phase))
    }
}

/// Computes the state that follows `intent`. Pure: random draws come from
/// `rng` and timestamps ride on the intent, so a seeded replay of the same
/// intents ends in the same state.
pub fn reduce<R: Rng + ?Sized>(
    state: &GameState,
    intent: &Intent,
    registry: &WordPackRegistry,
    rng: &mut R,
) -> Result<Transition, Rejection> {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match intent {
        Intent::Join(player) => {
            require_phase(&next, GamePhase::Lobby)?;
            if next.has_player(&player.id) {
                return Err(Rejection::AlreadyJoined(player.id.clone()));
            }
            let mut player = player.clone();
            player.is_host = false;
            player.clear_round_fields();
            info!(room = %next.room_code, player = %player.id, name = %player.name, "player joined");
            next.players.push(player);
        }
        Intent::UpdateSettings(config) => {
            require_phase(&next, GamePhase::Lobby)?;
            if !config.is_valid() {
                return Err(Rejection::InvalidConfig);
            }
            next.config = *config;
        }
        Intent::StartGame => {
            require_phase(&next, GamePhase::Lobby)?;
            let count = next.players.len();
            if count < MIN_PLAYERS {
                return Err(Rejection::NotEnoughPlayers(count));
            }
            if count % 2 == 0 {
                return Err(Rejection::EvenPlayerCount(count));
            }
            clear_game(&mut next);
            role_service::assign_roles(&mut next, registry, rng);
            next.timer = next.config.round_duration_base;
            next.phase = GamePhase::RoleReveal;
            info!(room = %next.room_code, players = count, "game started");
        }
        Intent::PlayerReady(id) => {
            require_phase(&next, GamePhase::RoleReveal)?;
            if !next.has_player(id) {
                return Err(Rejection::UnknownPlayer(id.clone()));
            }
            if !next.ready_players.insert(id.clone()) {
                return Err(Rejection::AlreadyReady(id.clone()));
            }
            if next.all_ready() {
                next.phase = GamePhase::GameRound;
                next.timer = next.config.round_duration_base;
                info!(room = %next.room_code, "everyone has seen their role");
            }
        }
        Intent::EndTurn {
            player_id,
            text,
            at,
        } => {
            turn_service::end_turn(&mut next, player_id, text, *at, rng)?;
        }
        Intent::Tick(at) => {
            if turn_service::tick(&mut next, *at, rng) == turn_service::TickOutcome::Idle {
                return Err(Rejection::ClockStopped);
            }
        }
        Intent::SubmitVote { voter_id, vote } => {
            if next.votes.get(voter_id) == Some(vote) {
                return Err(Rejection::DuplicateVote(voter_id.clone()));
            }
            vote_service::record_vote(&mut next, voter_id, vote.clone())?;
            if next.all_voted() {
                let outcome = vote_service::tally(&next);
                vote_service::apply_tally(&mut next, outcome);
                effects.push(Effect::ScheduleReveal);
            }
        }
        Intent::RevealResults => {
            require_phase(&next, GamePhase::Voting)?;
            if next.tally.is_none() {
                return Err(Rejection::VotesPending);
            }
            next.phase = GamePhase::Results;
        }
        Intent::Restart => {
            require_phase(&next, GamePhase::Results)?;
            clear_game(&mut next);
            next.phase = GamePhase::Lobby;
            effects.push(Effect::AnnounceRestart);
            info!(room = %next.room_code, "back to the lobby");
        }
        Intent::PlayerDisconnected(id) => {
            if !next.has_player(id) {
                return Err(Rejection::UnknownPlayer(id.clone()));
            }
            // Flagged only. Pausing, auto-piloting or ending the game is not
            // decided here; silent players keep timing out.
            if next.disconnected.insert(id.clone()) {
                warn!(room = %next.room_code, player = %id, phase = ?next.phase, "player connection lost");
            }
        }
    }

    debug!(intent = intent_name(intent), phase = ?next.phase, "intent applied");
    Ok(Transition {
        state: next,
        effects,
    })
}

fn intent_name(intent: &Intent) -> &'static str {
    match intent {
        Intent::Join(_) => "join",
        Intent::UpdateSettings(_) => "update_settings",
        Intent::StartGame => "start_game",
        Intent::PlayerReady(_) => "player_ready",
        Intent::EndTurn { .. } => "end_turn",
        Intent::Tick(_) => "tick",
        Intent::SubmitVote { .. } => "submit_vote",
        Intent::RevealResults => "reveal_results",
        Intent::Restart => "restart",
        Intent::PlayerDisconnected(_) => "player_disconnected",
    }
}

/// Forgets everything about the last game except scores and pack history.
fn clear_game(state: &mut GameState) {
    state.current_round = 1;
    state.turn_order.clear();
    state.turn_index = 0;
    state.current_turn_player_id = None;
    state.timer = 0;
    state.hints.clear();
    state.votes.clear();
    state.winners.clear();
    state.ready_players.clear();
    state.tally = None;
    state.word_pack = None;
    state.words.clear();
    for player in state.players.iter_mut() {
        player.clear_round_fields();
    }
}
