use rand::{rngs::StdRng, SeedableRng};
use tracing::info;

/// The only place game randomness comes from. A fixed seed replays a game
/// draw for draw.
pub fn game_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            info!(seed, "using fixed rng seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    }
}
