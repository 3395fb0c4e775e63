use rand::{seq::SliceRandom, Rng};
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{
    game::GameState,
    player::PlayerId,
    role::{SpecialRole, TeamTag},
};
use crate::services::{turn_service, word_pack_registry::WordPackRegistry};

/// Team sizes for `members` non-outsider players when the pack offers
/// `team_words` team words. Every team starts as a pair; leftovers go to the
/// currently smallest team.
pub fn team_sizes(members: usize, team_words: usize) -> Vec<usize> {
    let teams = (members / 2).min(team_words).min(TeamTag::TEAMS.len()).max(1);
    let mut sizes = vec![0usize; teams];
    let mut remaining = members;

    for size in sizes.iter_mut() {
        let seat = remaining.min(2);
        *size = seat;
        remaining -= seat;
    }
    while remaining > 0 {
        let smallest = sizes
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| **s)
            .map(|(i, _)| i)
            .unwrap_or(0);
        sizes[smallest] += 1;
        remaining -= 1;
    }
    sizes
}

fn team_pool(members: usize, team_words: usize) -> Vec<TeamTag> {
    team_sizes(members, team_words)
        .into_iter()
        .zip(TeamTag::TEAMS)
        .flat_map(|(size, tag)| std::iter::repeat(tag).take(size))
        .collect()
}

/// Deals words, teams, gifts and the turn order for a new game. The caller
/// has already checked the player count.
pub fn assign_roles<R: Rng + ?Sized>(
    state: &mut GameState,
    registry: &WordPackRegistry,
    rng: &mut R,
) {
    let (pack_index, history) = registry.select(&state.used_word_pack_indices, rng);
    let pack = match registry.get(pack_index) {
        Some(pack) => pack.clone(),
        None => return,
    };
    state.used_word_pack_indices = history;

    let mut shuffled = pack.words.clone();
    shuffled.shuffle(rng);
    let mut words = BTreeMap::new();
    let mut shuffled = shuffled.into_iter();
    if let Some(outsider_word) = shuffled.next() {
        words.insert(TeamTag::Outsider, outsider_word);
    }
    for (tag, word) in TeamTag::TEAMS.into_iter().zip(shuffled) {
        words.insert(tag, word);
    }

    let outsider_index = rng.gen_range(0..state.players.len());
    let mut pool = team_pool(state.players.len() - 1, pack.team_capacity());
    pool.shuffle(rng);
    let mut pool = pool.into_iter();

    for (index, player) in state.players.iter_mut().enumerate() {
        player.clear_round_fields();
        let tag = if index == outsider_index {
            TeamTag::Outsider
        } else {
            pool.next().unwrap_or(TeamTag::A)
        };
        player.is_outsider = tag == TeamTag::Outsider;
        player.role = Some(tag);
        player.word = words.get(&tag).cloned();
    }

    debug!(
        room = %state.room_code,
        pack = pack_index,
        "dealt {} players into teams",
        state.players.len()
    );

    state.word_pack = Some(pack);
    state.words = words;

    if state.config.include_special_roles {
        draw_gift(state, rng);
    }

    let mut order: Vec<PlayerId> = state.players.iter().map(|p| p.id.clone()).collect();
    order.shuffle(rng);
    state.turn_order = order;
    turn_service::seat_first_speaker(state);
}

/// Hands one gift to a random non-outsider who never had one. Clears the
/// previous round's gift first.
pub fn draw_gift<R: Rng + ?Sized>(
    state: &mut GameState,
    rng: &mut R,
) -> Option<(PlayerId, SpecialRole)> {
    for player in state.players.iter_mut() {
        player.special_role = SpecialRole::Normal;
    }

    let candidates: Vec<usize> = state
        .players
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_outsider && !p.had_special_role)
        .map(|(i, _)| i)
        .collect();

    let &chosen = candidates.choose(rng)?;
    let gift = *SpecialRole::GIFTS.choose(rng)?;

    let player = &mut state.players[chosen];
    player.special_role = gift;
    player.had_special_role = true;
    if gift == SpecialRole::Joker {
        player.was_joker = true;
    }
    debug!(player = %player.id, role = %gift, round = state.current_round, "gift role drawn");
    Some((player.id.clone(), gift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{config::GameConfig, player::Player, room::RoomCode};
    use rand::{rngs::StdRng, SeedableRng};

    fn lobby_with(count: usize, specials: bool) -> GameState {
        let mut players: Vec<Player> = (0..count)
            .map(|i| Player::new(PlayerId(format!("p{}", i)), format!("Player{}", i), "🎬"))
            .collect();
        players[0].is_host = true;
        GameState {
            players,
            config: GameConfig {
                include_special_roles: specials,
                ..GameConfig::default()
            },
            ..GameState::lobby(
                RoomCode::from("1234"),
                Player::new(PlayerId::from("x"), "x", ""),
                GameConfig::default(),
            )
        }
    }

    #[test]
    fn team_sizes_stay_balanced() {
        assert_eq!(team_sizes(2, 3), vec![2]);
        assert_eq!(team_sizes(4, 3), vec![2, 2]);
        assert_eq!(team_sizes(6, 3), vec![2, 2, 2]);
        assert_eq!(team_sizes(6, 2), vec![3, 3]);
        assert_eq!(team_sizes(8, 3), vec![3, 3, 2]);
        assert_eq!(team_sizes(10, 2), vec![5, 5]);
    }

    #[test]
    fn exactly_one_outsider_and_paired_teams() {
        let registry = WordPackRegistry::builtin();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = lobby_with(7, false);
            assign_roles(&mut state, &registry, &mut rng);

            let outsiders: Vec<_> = state.players.iter().filter(|p| p.is_outsider).collect();
            assert_eq!(outsiders.len(), 1);
            assert_eq!(outsiders[0].word.as_ref(), state.words.get(&TeamTag::Outsider));

            for tag in TeamTag::TEAMS {
                let members: Vec<_> = state
                    .players
                    .iter()
                    .filter(|p| p.role == Some(tag))
                    .collect();
                assert!(members.is_empty() || members.len() >= 2);
                for m in &members {
                    assert_eq!(m.word.as_ref(), state.words.get(&tag));
                    assert_ne!(m.word, outsiders[0].word);
                }
            }

            let mut order = state.turn_order.clone();
            order.sort();
            let mut ids: Vec<_> = state.players.iter().map(|p| p.id.clone()).collect();
            ids.sort();
            assert_eq!(order, ids);
            assert_eq!(state.used_word_pack_indices.len(), 1);
        }
    }

    #[test]
    fn gift_goes_to_each_player_at_most_once() {
        let registry = WordPackRegistry::builtin();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = lobby_with(5, true);
        assign_roles(&mut state, &registry, &mut rng);

        let mut holders = vec![state
            .players
            .iter()
            .find(|p| p.special_role.is_gift())
            .map(|p| p.id.clone())
            .unwrap()];
        // four non-outsiders, so three more draws succeed and the fifth fails
        for _ in 0..3 {
            let (id, _) = draw_gift(&mut state, &mut rng).unwrap();
            assert!(!holders.contains(&id));
            holders.push(id);
            assert_eq!(
                state.players.iter().filter(|p| p.special_role.is_gift()).count(),
                1
            );
        }
        assert!(draw_gift(&mut state, &mut rng).is_none());
        assert!(state.players.iter().all(|p| !p.special_role.is_gift()));
        assert!(state.outsider().map(|o| !o.had_special_role).unwrap());
    }

    #[test]
    fn first_turn_never_goes_to_a_mute_player() {
        let registry = WordPackRegistry::builtin();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut state = lobby_with(3, true);
            assign_roles(&mut state, &registry, &mut rng);
            let current = state.current_turn_player_id.clone().unwrap();
            assert!(!state.is_mute(&current));
            assert_eq!(state.turn_order[state.turn_index], current);
        }
    }
}
