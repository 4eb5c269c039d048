//! Role assignment, run once at game start

use super::player::Players;
use crate::types::{LobbySettings, PlayerId, Role};
use rand::seq::SliceRandom;
use rand::Rng;

/// Mafia members for a table of `n` players
pub fn mafia_count(n: usize) -> usize {
    match n {
        0..=6 => 1,
        7..=9 => 2,
        _ => 3,
    }
}

/// Shuffle the table and deal roles.
///
/// The first `mafia_count` shuffled players become mafia, the rest
/// townsfolk. Then, in shuffle order, the first townsfolk becomes doctor
/// (if enabled and more than 4 players) and the next townsfolk becomes
/// detective (if enabled and more than 6 players). Each conversion is
/// best-effort: if no townsfolk is left, it is skipped.
pub fn assign_roles<R: Rng + ?Sized>(players: &mut Players, settings: &LobbySettings, rng: &mut R) {
    let mut order: Vec<PlayerId> = players.keys().cloned().collect();
    order.shuffle(rng);

    let n = order.len();
    let mafia = mafia_count(n);

    for (i, id) in order.iter().enumerate() {
        if let Some(p) = players.get_mut(id) {
            p.role = Some(if i < mafia { Role::Mafia } else { Role::Townsfolk });
            p.alive = true;
            p.vote_target = None;
        }
    }

    if settings.doctor && n > 4 {
        convert_first_townsfolk(players, &order, Role::Doctor);
    }
    if settings.detective && n > 6 {
        convert_first_townsfolk(players, &order, Role::Detective);
    }
}

fn convert_first_townsfolk(players: &mut Players, order: &[PlayerId], role: Role) {
    let found = order
        .iter()
        .find(|id| players.get(*id).and_then(|p| p.role) == Some(Role::Townsfolk));

    if let Some(p) = found.and_then(|id| players.get_mut(id)) {
        p.role = Some(role);
    }
}
