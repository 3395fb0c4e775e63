use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::models::{
    game::{GamePhase, GameState, Hint},
    player::PlayerId,
};
use crate::services::{game_service::Rejection, role_service};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    NextTurn,
    NextRound,
    VotingStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Counting,
    Advanced(TurnOutcome),
}

/// First turn order index at or after `start` whose player is not muted,
/// wrapping at most once around the order.
pub fn next_speaker_from(state: &GameState, start: usize) -> Option<usize> {
    let len = state.turn_order.len();
    (0..len)
        .map(|offset| (start + offset) % len)
        .find(|&i| !state.is_mute(&state.turn_order[i]))
}

/// Hands the turn to the first speaking player of the order.
pub fn seat_first_speaker(state: &mut GameState) {
    match next_speaker_from(state, 0) {
        Some(index) => {
            state.turn_index = index;
            state.current_turn_player_id = Some(state.turn_order[index].clone());
        }
        None => {
            state.turn_index = 0;
            state.current_turn_player_id = None;
        }
    }
}

pub fn round_complete(state: &GameState) -> bool {
    let speakers: BTreeSet<&PlayerId> = state.speaking_players().collect();
    let spoken: BTreeSet<&PlayerId> = state
        .hints_for_round(state.current_round)
        .map(|h| &h.player_id)
        .filter(|id| speakers.contains(id))
        .collect();
    spoken.len() >= speakers.len()
}

/// Moves the game forward after the current turn ended, either by a hint or
/// by the clock.
pub fn advance_turn<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) -> TurnOutcome {
    if round_complete(state) {
        if state.current_round >= state.config.max_rounds {
            state.phase = GamePhase::Voting;
            state.current_turn_player_id = None;
            state.timer = 0;
            info!(room = %state.room_code, "all rounds played, voting opens");
            return TurnOutcome::VotingStarted;
        }

        state.current_round += 1;
        if state.config.include_special_roles {
            role_service::draw_gift(state, rng);
        }
        seat_first_speaker(state);
        state.timer = state.config.round_duration_base;
        info!(room = %state.room_code, round = state.current_round, "round started");
        return TurnOutcome::NextRound;
    }

    let len = state.turn_order.len();
    match next_speaker_from(state, (state.turn_index + 1) % len.max(1)) {
        Some(index) if len > 0 => {
            state.turn_index = index;
            state.current_turn_player_id = Some(state.turn_order[index].clone());
        }
        _ => state.current_turn_player_id = None,
    }
    state.timer = state.config.round_duration_base;
    TurnOutcome::NextTurn
}

/// One second of the turn clock. A silent speaker gets a placeholder hint
/// once the clock has run out.
pub fn tick<R: Rng + ?Sized>(state: &mut GameState, at: DateTime<Utc>, rng: &mut R) -> TickOutcome {
    if state.phase != GamePhase::GameRound {
        return TickOutcome::Idle;
    }
    if state.timer > 0 {
        state.timer -= 1;
        return TickOutcome::Counting;
    }

    if let Some(holder) = state.current_turn_player_id.clone() {
        if !state.is_mute(&holder) && !state.has_hint(&holder, state.current_round) {
            debug!(player = %holder, round = state.current_round, "turn timed out");
            state.hints.push(Hint::timed_out(holder, state.current_round, at));
        }
    }
    TickOutcome::Advanced(advance_turn(state, rng))
}

/// The turn holder is done talking.
pub fn end_turn<R: Rng + ?Sized>(
    state: &mut GameState,
    player_id: &PlayerId,
    text: &str,
    at: DateTime<Utc>,
    rng: &mut R,
) -> Result<TurnOutcome, Rejection> {
    if state.phase != GamePhase::GameRound {
        return Err(Rejection::WrongPhase(state.phase));
    }
    if !state.has_player(player_id) {
        return Err(Rejection::UnknownPlayer(player_id.clone()));
    }
    if state.has_hint(player_id, state.current_round) {
        return Err(Rejection::DuplicateHint {
            player: player_id.clone(),
            round: state.current_round,
        });
    }
    if state.is_mute(player_id) {
        return Err(Rejection::Muted(player_id.clone()));
    }
    if state.current_turn_player_id.as_ref() != Some(player_id) {
        return Err(Rejection::NotYourTurn(player_id.clone()));
    }

    state.hints.push(Hint::new(
        player_id.clone(),
        state.current_round,
        text.trim().to_string(),
        at,
    ));
    Ok(advance_turn(state, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        config::GameConfig, player::Player, role::SpecialRole, room::RoomCode,
    };
    use chrono::TimeZone;
    use rand::{rngs::StdRng, SeedableRng};

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn round_state(count: usize, max_rounds: u32) -> GameState {
        let players: Vec<Player> = (0..count)
            .map(|i| Player::new(PlayerId(format!("p{}", i)), format!("P{}", i), ""))
            .collect();
        let turn_order = players.iter().map(|p| p.id.clone()).collect();
        let mut state = GameState {
            room_code: RoomCode::from("4321"),
            phase: GamePhase::GameRound,
            players,
            config: GameConfig {
                max_rounds,
                round_duration_base: 3,
                include_special_roles: false,
            },
            turn_order,
            timer: 3,
            ..GameState::default()
        };
        seat_first_speaker(&mut state);
        state
    }

    fn id(i: usize) -> PlayerId {
        PlayerId(format!("p{}", i))
    }

    #[test]
    fn hints_walk_the_turn_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = round_state(3, 2);

        assert_eq!(end_turn(&mut state, &id(0), "red", at(), &mut rng), Ok(TurnOutcome::NextTurn));
        assert_eq!(state.current_turn_player_id, Some(id(1)));
        assert_eq!(end_turn(&mut state, &id(1), "hot", at(), &mut rng), Ok(TurnOutcome::NextTurn));
        assert_eq!(end_turn(&mut state, &id(2), "cup", at(), &mut rng), Ok(TurnOutcome::NextRound));
        assert_eq!(state.current_round, 2);
        assert_eq!(state.current_turn_player_id, Some(id(0)));
        assert_eq!(state.timer, 3);
    }

    #[test]
    fn out_of_turn_and_repeat_hints_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = round_state(3, 1);

        assert_eq!(
            end_turn(&mut state, &id(2), "early", at(), &mut rng),
            Err(Rejection::NotYourTurn(id(2)))
        );
        end_turn(&mut state, &id(0), "first", at(), &mut rng).unwrap();
        let before = state.clone();
        assert!(matches!(
            end_turn(&mut state, &id(0), "first", at(), &mut rng),
            Err(Rejection::DuplicateHint { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn silent_player_gets_a_placeholder_after_timeout() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = round_state(3, 1);

        for _ in 0..3 {
            assert_eq!(tick(&mut state, at(), &mut rng), TickOutcome::Counting);
        }
        assert_eq!(state.timer, 0);
        assert_eq!(
            tick(&mut state, at(), &mut rng),
            TickOutcome::Advanced(TurnOutcome::NextTurn)
        );
        assert_eq!(state.hints.len(), 1);
        assert!(state.hints[0].placeholder);
        assert_eq!(state.hints[0].player_id, id(0));
        assert_eq!(state.current_turn_player_id, Some(id(1)));
        assert_eq!(state.timer, 3);
    }

    #[test]
    fn mute_players_are_skipped_and_not_counted() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = round_state(3, 1);
        state.players[1].special_role = SpecialRole::Mute;

        end_turn(&mut state, &id(0), "a", at(), &mut rng).unwrap();
        assert_eq!(state.current_turn_player_id, Some(id(2)));
        assert_eq!(
            end_turn(&mut state, &id(1), "b", at(), &mut rng),
            Err(Rejection::Muted(id(1)))
        );
        assert_eq!(
            end_turn(&mut state, &id(2), "c", at(), &mut rng),
            Ok(TurnOutcome::VotingStarted)
        );
        assert_eq!(state.phase, GamePhase::Voting);
        assert_eq!(state.current_turn_player_id, None);
        assert_eq!(state.timer, 0);
    }

    #[test]
    fn all_mute_order_does_not_deadlock() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = round_state(3, 1);
        for p in state.players.iter_mut() {
            p.special_role = SpecialRole::Mute;
        }
        seat_first_speaker(&mut state);
        assert_eq!(state.current_turn_player_id, None);
        state.timer = 0;
        assert_eq!(
            tick(&mut state, at(), &mut rng),
            TickOutcome::Advanced(TurnOutcome::VotingStarted)
        );
    }

    #[test]
    fn tick_outside_game_round_is_idle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = round_state(3, 1);
        state.phase = GamePhase::Voting;
        assert_eq!(tick(&mut state, at(), &mut rng), TickOutcome::Idle);
        assert_eq!(state.timer, 3);
    }
}
