use chrono::{DateTime, TimeZone, Utc};
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};

use outsider::{
    models::{
        config::GameConfig,
        game::{GamePhase, VotePayload},
        player::{Player, PlayerId},
        room::RoomCode,
    },
    services::{
        authority::Authority,
        game_service::{Effect, Intent, Rejection},
        word_pack_registry::WordPackRegistry,
    },
    utils::test_setup::setup_test_env,
};
use rand::{rngs::StdRng, SeedableRng};

fn clock(second: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + second, 0).unwrap()
}

fn table(count: usize, config: GameConfig, seed: u64) -> Authority {
    let mut authority = Authority::open(
        RoomCode::from("2024"),
        Player::host(PlayerId::from("p0"), "Host", "🎩"),
        config,
        Arc::new(WordPackRegistry::builtin()),
        StdRng::seed_from_u64(seed),
    );
    for i in 1..count {
        authority
            .dispatch(Intent::Join(Player::new(
                PlayerId(format!("p{}", i)),
                format!("Player{}", i),
                "🙂",
            )))
            .unwrap();
    }
    authority
}

fn start_and_ready(authority: &mut Authority) {
    authority.dispatch(Intent::StartGame).unwrap();
    let ids: Vec<PlayerId> = authority.state().players.iter().map(|p| p.id.clone()).collect();
    for id in ids {
        authority.dispatch(Intent::PlayerReady(id)).unwrap();
    }
    assert_eq!(authority.state().phase, GamePhase::GameRound);
}

/// Lets the current speaker talk until the round counter moves or voting opens.
fn play_round(authority: &mut Authority) {
    let round = authority.state().current_round;
    while authority.state().phase == GamePhase::GameRound
        && authority.state().current_round == round
    {
        let speaker = authority.state().current_turn_player_id.clone().unwrap();
        authority
            .dispatch(Intent::EndTurn {
                player_id: speaker.clone(),
                text: format!("clue from {}", speaker),
                at: clock(authority.state().hints.len() as i64),
            })
            .unwrap();
    }
}

fn teammate_of(authority: &Authority, id: &PlayerId) -> Option<PlayerId> {
    let state = authority.state();
    let me = state.player(id)?;
    state
        .players
        .iter()
        .find(|p| p.id != me.id && !p.is_outsider && p.role == me.role)
        .map(|p| p.id.clone())
}

fn vote(authority: &mut Authority, voter: &PlayerId, accused: &PlayerId, teammate: Option<PlayerId>) -> Vec<Effect> {
    authority
        .dispatch(Intent::SubmitVote {
            voter_id: voter.clone(),
            vote: VotePayload {
                accused_outsider_id: accused.clone(),
                claimed_teammate_id: teammate,
            },
        })
        .unwrap()
}

fn no_specials(rounds: u32) -> GameConfig {
    GameConfig {
        max_rounds: rounds,
        round_duration_base: 20,
        include_special_roles: false,
    }
}

fn caught_by_three_of_five(outsider_claims_teammate: bool) -> Authority {
    let mut authority = table(5, no_specials(1), 17);
    start_and_ready(&mut authority);
    play_round(&mut authority);
    assert_eq!(authority.state().phase, GamePhase::Voting);

    let outsider = authority.state().outsider().unwrap().id.clone();
    let members: Vec<PlayerId> = authority
        .state()
        .players
        .iter()
        .filter(|p| !p.is_outsider)
        .map(|p| p.id.clone())
        .collect();
    let scapegoat = members[0].clone();

    for member in &members[..3] {
        let mate = teammate_of(&authority, member);
        assert!(vote(&mut authority, member, &outsider, mate).is_empty());
    }
    let mate = teammate_of(&authority, &members[3]);
    vote(&mut authority, &members[3], &scapegoat, mate);

    let outsider_claim = if outsider_claims_teammate {
        Some(members[1].clone())
    } else {
        None
    };
    let effects = vote(&mut authority, &outsider, &scapegoat, outsider_claim);
    assert_eq!(effects, vec![Effect::ScheduleReveal]);
    authority.dispatch(Intent::RevealResults).unwrap();
    authority
}

#[test]
fn three_accusers_out_of_five_catch_the_outsider() {
    setup_test_env();
    let authority = caught_by_three_of_five(false);
    let state = authority.state();
    assert_eq!(state.phase, GamePhase::Results);

    let tally = state.tally.as_ref().unwrap();
    let outsider = state.outsider().unwrap();
    assert!(tally.outsider_caught);
    assert_eq!(tally.total_accusations, 5);
    assert_eq!(tally.accusations[&outsider.id], 3);
    assert_eq!(tally.executed.as_ref(), Some(&outsider.id));

    // admitted having no teammate: +3 even though caught
    assert_eq!(outsider.score, 3);

    let members: Vec<_> = state.players.iter().filter(|p| !p.is_outsider).collect();
    let accusers: BTreeSet<PlayerId> = members[..3].iter().map(|p| p.id.clone()).collect();
    for member in &members[..3] {
        assert_eq!(member.score, 4, "catch plus teammate for {}", member.id);
    }
    assert_eq!(members[3].score, 2);
    assert_eq!(state.winners, accusers);
}

#[test]
fn outsider_claiming_a_teammate_scores_nothing_when_caught() {
    setup_test_env();
    let authority = caught_by_three_of_five(true);
    assert_eq!(authority.state().outsider().unwrap().score, 0);
}

#[test]
fn seven_players_over_three_rounds_get_three_distinct_gift_holders() {
    setup_test_env();
    let config = GameConfig {
        max_rounds: 3,
        round_duration_base: 20,
        include_special_roles: true,
    };
    for seed in [1, 2, 3, 4] {
        let mut authority = table(7, config, seed);
        start_and_ready(&mut authority);

        let mut holders = Vec::new();
        for round in 1..=3 {
            let state = authority.state();
            assert_eq!(state.current_round, round);
            let gifted: Vec<_> = state.players.iter().filter(|p| p.special_role.is_gift()).collect();
            assert_eq!(gifted.len(), 1, "one gift at a time");
            assert!(!gifted[0].is_outsider);
            holders.push(gifted[0].id.clone());

            // every speaking member hints exactly once per round
            let speakers: BTreeSet<PlayerId> = state.speaking_players().cloned().collect();
            play_round(&mut authority);
            let hinted: Vec<PlayerId> = authority
                .state()
                .hints_for_round(round)
                .map(|h| h.player_id.clone())
                .collect();
            assert_eq!(hinted.len(), speakers.len());
            assert_eq!(hinted.into_iter().collect::<BTreeSet<_>>(), speakers);
        }

        let distinct: HashSet<_> = holders.iter().collect();
        assert_eq!(distinct.len(), 3, "seed {} repeated a gift holder", seed);
        assert_eq!(authority.state().phase, GamePhase::Voting);
    }
}

#[test]
fn duplicate_end_turn_in_round_two_advances_once() {
    setup_test_env();
    let mut authority = table(5, no_specials(2), 3);
    start_and_ready(&mut authority);
    play_round(&mut authority);
    assert_eq!(authority.state().current_round, 2);

    let speaker = authority.state().current_turn_player_id.clone().unwrap();
    let end_turn = Intent::EndTurn {
        player_id: speaker.clone(),
        text: "crunchy".to_string(),
        at: clock(60),
    };
    authority.dispatch(end_turn.clone()).unwrap();
    let after_first = authority.state().clone();

    let repeat = authority.dispatch(end_turn);
    assert!(matches!(repeat, Err(Rejection::DuplicateHint { round: 2, .. })));
    assert!(repeat.unwrap_err().is_duplicate());
    assert_eq!(authority.state(), &after_first);
    assert_eq!(
        authority
            .state()
            .hints_for_round(2)
            .filter(|h| h.player_id == speaker)
            .count(),
        1
    );
    assert_ne!(authority.state().current_turn_player_id, Some(speaker));
}

#[test]
fn silent_speaker_times_out_with_a_placeholder() {
    setup_test_env();
    let config = GameConfig {
        max_rounds: 1,
        round_duration_base: 2,
        include_special_roles: false,
    };
    let mut authority = table(3, config, 8);
    start_and_ready(&mut authority);
    let silent = authority.state().current_turn_player_id.clone().unwrap();

    for second in 0..3 {
        authority.dispatch(Intent::Tick(clock(second))).unwrap();
    }
    let state = authority.state();
    let hint = state.hints.iter().find(|h| h.player_id == silent).unwrap();
    assert!(hint.placeholder);
    assert_ne!(state.current_turn_player_id, Some(silent));
    assert_eq!(state.timer, 2);
}

#[test]
fn word_packs_do_not_repeat_until_the_catalog_is_used_up() {
    setup_test_env();
    let catalog = WordPackRegistry::builtin().len();
    let mut authority = table(3, no_specials(1), 21);
    let mut seen = HashSet::new();

    for game in 0..=catalog {
        authority.dispatch(Intent::StartGame).unwrap();
        let history = authority.state().used_word_pack_indices.clone();
        if game < catalog {
            assert_eq!(history.len(), game + 1);
            assert!(seen.insert(*history.last().unwrap()));
        } else {
            assert_eq!(history.len(), 1, "history restarts after a full cycle");
        }

        // fast-forward to the results screen and go back to the lobby
        let ids: Vec<PlayerId> = authority.state().players.iter().map(|p| p.id.clone()).collect();
        for id in &ids {
            authority.dispatch(Intent::PlayerReady(id.clone())).unwrap();
        }
        play_round(&mut authority);
        for id in &ids {
            vote(&mut authority, id, &ids[0], None);
        }
        authority.dispatch(Intent::RevealResults).unwrap();
        authority.dispatch(Intent::Restart).unwrap();
        assert_eq!(authority.state().phase, GamePhase::Lobby);
    }
}

#[test]
fn intents_in_the_wrong_phase_leave_the_state_alone() {
    setup_test_env();
    let mut authority = table(3, no_specials(1), 5);
    let before = authority.state().clone();

    assert_eq!(
        authority.dispatch(Intent::Restart),
        Err(Rejection::WrongPhase(GamePhase::Lobby))
    );
    assert_eq!(authority.dispatch(Intent::Tick(clock(0))), Err(Rejection::ClockStopped));
    assert_eq!(
        authority.dispatch(Intent::RevealResults),
        Err(Rejection::WrongPhase(GamePhase::Lobby))
    );
    assert_eq!(authority.state(), &before);
}

#[test]
fn seeded_replay_ends_in_the_same_state() {
    setup_test_env();
    let config = GameConfig {
        max_rounds: 2,
        round_duration_base: 1,
        include_special_roles: true,
    };
    let play = || {
        let mut authority = table(5, config, 42);
        start_and_ready(&mut authority);
        let mut second = 0;
        while authority.state().phase == GamePhase::GameRound {
            second += 1;
            let speaker = authority.state().current_turn_player_id.clone();
            match speaker {
                // two silent beats run the clock out, the third speaks
                Some(id) if second % 3 == 0 => {
                    authority
                        .dispatch(Intent::EndTurn {
                            player_id: id,
                            text: "same clue".to_string(),
                            at: clock(second),
                        })
                        .unwrap();
                }
                _ => {
                    authority.dispatch(Intent::Tick(clock(second))).unwrap();
                }
            }
        }
        authority.state().clone()
    };

    let first = play();
    let second = play();
    assert_eq!(first.phase, GamePhase::Voting);
    assert!(first.hints.iter().any(|h| h.placeholder));
    assert_eq!(first, second);
}

#[test]
fn repeated_and_late_votes_leave_the_state_alone() {
    setup_test_env();
    let mut authority = table(3, no_specials(1), 12);
    start_and_ready(&mut authority);
    play_round(&mut authority);
    assert_eq!(authority.state().phase, GamePhase::Voting);

    let ids: Vec<PlayerId> = authority.state().players.iter().map(|p| p.id.clone()).collect();
    let ballot = |accused: &PlayerId| Intent::SubmitVote {
        voter_id: ids[0].clone(),
        vote: VotePayload {
            accused_outsider_id: accused.clone(),
            claimed_teammate_id: None,
        },
    };

    authority.dispatch(ballot(&ids[1])).unwrap();
    let after_first = authority.state().clone();
    let repeat = authority.dispatch(ballot(&ids[1]));
    assert_eq!(repeat, Err(Rejection::DuplicateVote(ids[0].clone())));
    assert!(repeat.unwrap_err().is_duplicate());
    assert_eq!(authority.state(), &after_first);

    // a changed mind before the tally replaces the ballot
    authority.dispatch(ballot(&ids[2])).unwrap();
    assert_eq!(authority.state().votes.len(), 1);
    assert_eq!(authority.state().votes[&ids[0]].accused_outsider_id, ids[2]);

    vote(&mut authority, &ids[1], &ids[2], None);
    let effects = vote(&mut authority, &ids[2], &ids[1], None);
    assert_eq!(effects, vec![Effect::ScheduleReveal]);
    let tallied = authority.state().clone();
    assert!(tallied.tally.is_some());

    assert_eq!(authority.dispatch(ballot(&ids[1])), Err(Rejection::AlreadyTallied));
    assert_eq!(authority.state(), &tallied);
}
