use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::models::{
    game::{GamePhase, GameState, TallyOutcome, VotePayload},
    player::{Player, PlayerId},
};
use crate::services::game_service::Rejection;

pub const ESCAPE_POINTS: i32 = 5;
pub const SELF_AWARE_POINTS: i32 = 3;
pub const CATCH_POINTS: i32 = 2;
pub const TEAMMATE_POINTS: i32 = 2;
pub const FALSE_SUSPICION_PENALTY: i32 = -2;
pub const JOKER_POINTS_PER_VOTE: i32 = 2;

/// Stores or overwrites a ballot. Ballots are closed once the tally ran.
pub fn record_vote(
    state: &mut GameState,
    voter_id: &PlayerId,
    vote: VotePayload,
) -> Result<(), Rejection> {
    if state.phase != GamePhase::Voting {
        return Err(Rejection::WrongPhase(state.phase));
    }
    if state.tally.is_some() {
        return Err(Rejection::AlreadyTallied);
    }
    if !state.has_player(voter_id) {
        return Err(Rejection::UnknownPlayer(voter_id.clone()));
    }
    state.votes.insert(voter_id.clone(), vote);
    Ok(())
}

fn same_team(a: &Player, b: &Player) -> bool {
    a.id != b.id && !a.is_outsider && !b.is_outsider && a.role.is_some() && a.role == b.role
}

/// Counts the accusations and works out every player's score change. Votes
/// naming players that are no longer in the room are skipped.
pub fn tally(state: &GameState) -> TallyOutcome {
    let mut accusations: BTreeMap<PlayerId, u32> = BTreeMap::new();
    for (voter, vote) in &state.votes {
        if state.has_player(voter) && state.has_player(&vote.accused_outsider_id) {
            *accusations
                .entry(vote.accused_outsider_id.clone())
                .or_default() += 1;
        }
    }
    let total_accusations: u32 = accusations.values().sum();

    let top = accusations.values().copied().max().unwrap_or(0);
    let leaders: Vec<&PlayerId> = accusations
        .iter()
        .filter(|(_, n)| **n == top && **n > 0)
        .map(|(id, _)| id)
        .collect();
    let executed = match leaders.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    };

    let outsider = state.outsider();
    let outsider_votes = outsider
        .and_then(|o| accusations.get(&o.id).copied())
        .unwrap_or(0);
    // strict majority, exactly half is not enough
    let outsider_caught = outsider.is_some() && outsider_votes * 2 > total_accusations;

    let mut deltas = BTreeMap::new();
    for player in &state.players {
        let vote = state.votes.get(&player.id);
        let mut delta = 0;

        if player.is_outsider {
            if !outsider_caught {
                delta += ESCAPE_POINTS;
            }
            if matches!(vote, Some(v) if v.claimed_teammate_id.is_none()) {
                delta += SELF_AWARE_POINTS;
            }
        } else if let Some(vote) = vote {
            let accused_outsider = outsider.map(|o| o.id == vote.accused_outsider_id).unwrap_or(false);
            if outsider_caught && accused_outsider {
                delta += CATCH_POINTS;
            }
            match &vote.claimed_teammate_id {
                Some(claimed) => {
                    if state.player(claimed).map(|c| same_team(player, c)).unwrap_or(false) {
                        delta += TEAMMATE_POINTS;
                    }
                }
                None => delta += FALSE_SUSPICION_PENALTY,
            }
        }

        if player.was_joker {
            let received = accusations.get(&player.id).copied().unwrap_or(0) as i32;
            delta += JOKER_POINTS_PER_VOTE * received;
        }

        deltas.insert(player.id.clone(), delta);
    }

    TallyOutcome {
        accusations,
        total_accusations,
        executed,
        outsider_id: outsider.map(|o| o.id.clone()),
        outsider_caught,
        deltas,
    }
}

/// The outsider if they escaped, otherwise everyone who pointed at them.
pub fn winners(state: &GameState, outcome: &TallyOutcome) -> BTreeSet<PlayerId> {
    let Some(outsider_id) = &outcome.outsider_id else {
        return BTreeSet::new();
    };
    if !outcome.outsider_caught {
        return BTreeSet::from([outsider_id.clone()]);
    }
    state
        .players
        .iter()
        .filter(|p| !p.is_outsider)
        .filter(|p| {
            state
                .votes
                .get(&p.id)
                .map(|v| &v.accused_outsider_id == outsider_id)
                .unwrap_or(false)
        })
        .map(|p| p.id.clone())
        .collect()
}

/// Commits a tally: scores, winners and the outcome itself, in one step.
pub fn apply_tally(state: &mut GameState, outcome: TallyOutcome) {
    for player in state.players.iter_mut() {
        let delta = outcome.deltas.get(&player.id).copied().unwrap_or(0);
        player.score += delta.max(0) as u32;
    }
    state.winners = winners(state, &outcome);
    info!(
        room = %state.room_code,
        caught = outcome.outsider_caught,
        executed = ?outcome.executed,
        "votes tallied"
    );
    state.tally = Some(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::TeamTag;

    fn id(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn player(name: &str, tag: TeamTag) -> Player {
        let mut p = Player::new(id(name), name, "");
        p.role = Some(tag);
        p.is_outsider = tag == TeamTag::Outsider;
        p
    }

    fn vote(accused: &str, teammate: Option<&str>) -> VotePayload {
        VotePayload {
            accused_outsider_id: id(accused),
            claimed_teammate_id: teammate.map(id),
        }
    }

    // x is the outsider, a1/a2 and b1/b2 are teams
    fn voting_state() -> GameState {
        GameState {
            phase: GamePhase::Voting,
            players: vec![
                player("x", TeamTag::Outsider),
                player("a1", TeamTag::A),
                player("a2", TeamTag::A),
                player("b1", TeamTag::B),
                player("b2", TeamTag::B),
            ],
            ..GameState::default()
        }
    }

    #[test]
    fn half_of_the_votes_is_not_a_catch() {
        let mut state = voting_state();
        state.players.pop();
        state.votes.insert(id("x"), vote("a1", None));
        state.votes.insert(id("a1"), vote("x", Some("a2")));
        state.votes.insert(id("a2"), vote("x", Some("a1")));
        state.votes.insert(id("b1"), vote("a2", Some("a1")));

        let outcome = tally(&state);
        assert_eq!(outcome.total_accusations, 4);
        assert_eq!(outcome.accusations[&id("x")], 2);
        assert!(!outcome.outsider_caught);
        assert_eq!(outcome.executed, Some(id("x")));
        assert_eq!(outcome.deltas[&id("x")], ESCAPE_POINTS + SELF_AWARE_POINTS);
    }

    #[test]
    fn strict_majority_catches_the_outsider() {
        let mut state = voting_state();
        state.votes.insert(id("x"), vote("b1", Some("a1")));
        state.votes.insert(id("a1"), vote("x", Some("a2")));
        state.votes.insert(id("a2"), vote("x", None));
        state.votes.insert(id("b1"), vote("x", Some("a1")));
        state.votes.insert(id("b2"), vote("b1", Some("b1")));

        let outcome = tally(&state);
        assert!(outcome.outsider_caught);
        assert_eq!(outcome.deltas[&id("x")], 0);
        assert_eq!(outcome.deltas[&id("a1")], CATCH_POINTS + TEAMMATE_POINTS);
        assert_eq!(outcome.deltas[&id("a2")], CATCH_POINTS + FALSE_SUSPICION_PENALTY);
        assert_eq!(outcome.deltas[&id("b1")], CATCH_POINTS);
        assert_eq!(outcome.deltas[&id("b2")], TEAMMATE_POINTS);

        apply_tally(&mut state, outcome);
        assert_eq!(
            state.winners,
            BTreeSet::from([id("a1"), id("a2"), id("b1")])
        );
        assert_eq!(state.player(&id("a2")).unwrap().score, 0);
        assert_eq!(state.player(&id("a1")).unwrap().score, 4);
        assert!(state.tally.is_some());
    }

    #[test]
    fn false_suspicion_never_lowers_the_total() {
        let mut state = voting_state();
        state.players[1].score = 7;
        for p in ["x", "a1", "a2", "b1", "b2"] {
            state.votes.insert(id(p), vote("b2", None));
        }
        let outcome = tally(&state);
        assert_eq!(outcome.deltas[&id("a1")], FALSE_SUSPICION_PENALTY);
        apply_tally(&mut state, outcome);
        assert_eq!(state.player(&id("a1")).unwrap().score, 7);
        assert_eq!(state.winners, BTreeSet::from([id("x")]));
    }

    #[test]
    fn joker_is_paid_per_accusation() {
        let mut state = voting_state();
        state.players[3].was_joker = true;
        state.votes.insert(id("x"), vote("b1", Some("a1")));
        state.votes.insert(id("a1"), vote("b1", Some("b2")));
        state.votes.insert(id("a2"), vote("b1", Some("b2")));
        state.votes.insert(id("b1"), vote("x", Some("b2")));
        state.votes.insert(id("b2"), vote("x", Some("a1")));

        let outcome = tally(&state);
        assert_eq!(outcome.executed, Some(id("b1")));
        assert_eq!(
            outcome.deltas[&id("b1")],
            TEAMMATE_POINTS + 3 * JOKER_POINTS_PER_VOTE
        );
    }

    #[test]
    fn votes_for_departed_players_are_skipped() {
        let mut state = voting_state();
        for p in ["x", "a1", "a2", "b1"] {
            state.votes.insert(id(p), vote("x", Some("a1")));
        }
        state.votes.insert(id("b2"), vote("ghost", Some("b1")));

        let outcome = tally(&state);
        assert_eq!(outcome.total_accusations, 4);
        assert!(!outcome.accusations.contains_key(&id("ghost")));
        assert!(outcome.outsider_caught);
    }

    #[test]
    fn ballots_close_after_the_tally() {
        let mut state = voting_state();
        assert!(record_vote(&mut state, &id("a1"), vote("x", None)).is_ok());
        assert!(record_vote(&mut state, &id("a1"), vote("b1", None)).is_ok());
        assert_eq!(state.votes[&id("a1")], vote("b1", None));
        assert_eq!(
            record_vote(&mut state, &id("nobody"), vote("x", None)),
            Err(Rejection::UnknownPlayer(id("nobody")))
        );

        state.tally = Some(TallyOutcome::default());
        assert_eq!(
            record_vote(&mut state, &id("a2"), vote("x", None)),
            Err(Rejection::AlreadyTallied)
        );
    }
}
