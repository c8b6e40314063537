//! Role assignment at game start.

use std::collections::HashMap;

use greenroom_protocol::{PlayerId, Role};
use rand::seq::SliceRandom;

/// How many deceivers a game of `player_count` members gets.
///
/// 1 for up to 4 players, 2 for 5–7, 3 for 8 and above.
pub fn deceiver_count(player_count: usize) -> usize {
    match player_count {
        0..=4 => 1,
        5..=7 => 2,
        _ => 3,
    }
}

/// Randomly assigns roles to every member: `deceiver_count` deceivers,
/// the rest innocents.
pub fn assign_roles(members: &[PlayerId]) -> HashMap<PlayerId, Role> {
    let mut shuffled = members.to_vec();
    shuffled.shuffle(&mut rand::rng());

    let k = deceiver_count(members.len());
    shuffled
        .into_iter()
        .enumerate()
        .map(|(i, player_id)| {
            let role = if i < k { Role::Deceiver } else { Role::Innocent };
            (player_id, role)
        })
        .collect()
}
