use tracing::debug;

use crate::models::{
    game::{GamePhase, GameState},
    player::PlayerId,
};

/// Haptic or sound cue requested by the engine. Rendering them is left to
/// whatever sits on the other side of [`FeedbackSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Click,
    Success,
    Error,
    Turn,
}

pub trait FeedbackSink: Send + Sync {
    fn cue(&self, cue: Cue);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl FeedbackSink for NoFeedback {
    fn cue(&self, _cue: Cue) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn cue(&self, cue: Cue) {
        debug!(?cue, "feedback");
    }
}

/// Cues the local player should feel for a state change.
pub fn cues_between(local: &PlayerId, before: &GameState, after: &GameState) -> Vec<Cue> {
    let mut cues = Vec::new();
    let my_turn = |s: &GameState| {
        s.phase == GamePhase::GameRound && s.current_turn_player_id.as_ref() == Some(local)
    };
    if my_turn(after) && (!my_turn(before) || before.current_round != after.current_round) {
        cues.push(Cue::Turn);
    }
    if before.phase != GamePhase::Results
        && after.phase == GamePhase::Results
        && after.winners.contains(local)
    {
        cues.push(Cue::Success);
    }
    cues
}
