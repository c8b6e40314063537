//! Integration tests for the lobby registry: the membership invariants,
//! the status machine, and the fix-vs-expiry race settled by the
//! generation claim.

use std::time::Duration;

use greenroom_lobby::{
    JoinOutcome, LeaveOutcome, LobbyConfig, LobbyError, LobbyRegistry,
};
use greenroom_protocol::{LobbyStatus, PlayerId, Role, SabotageKind};

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn registry() -> LobbyRegistry {
    LobbyRegistry::new(LobbyConfig::default())
}

/// Create a lobby hosted by player 1 with players 2..=n joined.
fn lobby_of(reg: &mut LobbyRegistry, n: u64, capacity: usize) -> greenroom_protocol::LobbyId {
    let lobby_id = reg
        .create(pid(1), "ark".into(), capacity, true)
        .expect("create should succeed");
    for p in 2..=n {
        reg.join(pid(p), lobby_id).expect("join should succeed");
    }
    lobby_id
}

/// Start a game and return the id of one deceiver and one innocent.
fn started_game(
    reg: &mut LobbyRegistry,
    n: u64,
) -> (greenroom_protocol::LobbyId, PlayerId, PlayerId) {
    let lobby_id = lobby_of(reg, n, n as usize);
    let start = reg.start_game(pid(1)).expect("start should succeed");
    let deceiver = *start
        .roles
        .iter()
        .find(|(_, r)| **r == Role::Deceiver)
        .map(|(p, _)| p)
        .expect("at least one deceiver");
    let innocent = *start
        .roles
        .iter()
        .find(|(_, r)| **r == Role::Innocent)
        .map(|(p, _)| p)
        .expect("at least one innocent");
    (lobby_id, deceiver, innocent)
}

// =========================================================================
// Creation
// =========================================================================

#[test]
fn test_create_seats_host_and_enforces_capacity_bounds() {
    let mut reg = registry();

    let lobby_id = reg.create(pid(1), "ark".into(), 4, true).unwrap();

    let lobby = reg.get(lobby_id).unwrap();
    assert_eq!(lobby.host, pid(1));
    assert_eq!(lobby.player_count(), 1);
    assert_eq!(reg.lobby_of(pid(1)), Some(lobby_id));

    assert!(matches!(
        reg.create(pid(2), "tiny".into(), 3, true),
        Err(LobbyError::InvalidCapacity(3))
    ));
    assert!(matches!(
        reg.create(pid(2), "huge".into(), 16, true),
        Err(LobbyError::InvalidCapacity(16))
    ));
}

#[test]
fn test_create_while_seated_elsewhere_is_rejected() {
    let mut reg = registry();
    let first = reg.create(pid(1), "a".into(), 4, true).unwrap();

    let result = reg.create(pid(1), "b".into(), 4, true);

    assert!(matches!(
        result,
        Err(LobbyError::AlreadyInOtherLobby(p, l)) if p == pid(1) && l == first
    ));
    assert_eq!(reg.lobby_count(), 1);
}

#[test]
fn test_list_public_hides_private_lobbies() {
    let mut reg = registry();
    let public_id = reg.create(pid(1), "open ark".into(), 4, true).unwrap();
    reg.create(pid(2), "secret ark".into(), 4, false).unwrap();

    let listed = reg.list_public();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].lobby_id, public_id);
    assert_eq!(listed[0].player_count, 1);
}

#[test]
fn test_list_public_hides_in_progress_lobbies() {
    let mut reg = registry();
    lobby_of(&mut reg, 4, 4);
    reg.start_game(pid(1)).unwrap();
    let open_id = reg.create(pid(9), "waiting".into(), 4, true).unwrap();

    let listed = reg.list_public();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].lobby_id, open_id);
}

#[test]
fn test_list_public_is_newest_first_and_capped() {
    let mut reg = LobbyRegistry::new(LobbyConfig {
        list_limit: 2,
        ..LobbyConfig::default()
    });
    reg.create(pid(1), "first".into(), 4, true).unwrap();
    let second = reg.create(pid(2), "second".into(), 4, true).unwrap();
    let third = reg.create(pid(3), "third".into(), 4, true).unwrap();

    let listed = reg.list_public();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].lobby_id, third);
    assert_eq!(listed[1].lobby_id, second);
}

// =========================================================================
// Join: idempotence, single membership, capacity
// =========================================================================

#[test]
fn test_join_twice_is_idempotent() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 1, 4);

    assert_eq!(reg.join(pid(2), lobby_id).unwrap(), JoinOutcome::Joined);
    let count_after_first = reg.get(lobby_id).unwrap().player_count();

    assert_eq!(
        reg.join(pid(2), lobby_id).unwrap(),
        JoinOutcome::AlreadyInLobby
    );
    assert_eq!(reg.get(lobby_id).unwrap().player_count(), count_after_first);
}

#[test]
fn test_join_second_lobby_is_rejected() {
    let mut reg = registry();
    let first = lobby_of(&mut reg, 2, 4);
    let second = reg.create(pid(9), "other".into(), 4, true).unwrap();

    let result = reg.join(pid(2), second);

    assert!(matches!(
        result,
        Err(LobbyError::AlreadyInOtherLobby(p, l)) if p == pid(2) && l == first
    ));
    // Membership unchanged on both sides.
    assert_eq!(reg.lobby_of(pid(2)), Some(first));
    assert_eq!(reg.get(second).unwrap().player_count(), 1);
}

#[test]
fn test_join_unknown_lobby_fails_not_found() {
    let mut reg = registry();
    let result = reg.join(pid(1), greenroom_protocol::LobbyId(404));
    assert!(matches!(result, Err(LobbyError::NotFound(_))));
}

#[test]
fn test_join_flips_full_exactly_at_capacity() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 3, 4);
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Open);

    reg.join(pid(4), lobby_id).unwrap();

    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Full);
}

#[test]
fn test_join_full_lobby_fails() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 4, 4);

    let result = reg.join(pid(5), lobby_id);

    assert!(matches!(result, Err(LobbyError::Full(l)) if l == lobby_id));
    assert_eq!(reg.get(lobby_id).unwrap().player_count(), 4);
}

#[test]
fn test_join_in_progress_lobby_fails_not_joinable() {
    let mut reg = registry();
    let (lobby_id, ..) = started_game(&mut reg, 4);

    let result = reg.join(pid(9), lobby_id);

    assert!(matches!(result, Err(LobbyError::NotJoinable(_))));
}

// =========================================================================
// Leave: host promotion, full reversion, deletion
// =========================================================================

#[test]
fn test_leave_host_promotes_earliest_joined() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 3, 4);

    let outcome = reg.leave(pid(1)).unwrap();

    assert_eq!(
        outcome,
        LeaveOutcome::Left {
            lobby_id,
            new_host: Some(pid(2)),
        }
    );
    assert_eq!(reg.get(lobby_id).unwrap().host, pid(2));
    assert_eq!(reg.lobby_of(pid(1)), None);
}

#[test]
fn test_leave_reverts_full_to_open() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 4, 4);
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Full);

    reg.leave(pid(3)).unwrap();

    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Open);
}

#[test]
fn test_leave_last_member_deletes_lobby() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 1, 4);

    let outcome = reg.leave(pid(1)).unwrap();

    assert_eq!(outcome, LeaveOutcome::LobbyDeleted { lobby_id });
    assert!(reg.get(lobby_id).is_none());
    assert_eq!(reg.lobby_count(), 0);
}

#[test]
fn test_leave_without_lobby_fails_not_in_lobby() {
    let mut reg = registry();
    let result = reg.leave(pid(42));
    assert!(matches!(result, Err(LobbyError::NotInLobby(p)) if p == pid(42)));
}

#[test]
fn test_rejoin_after_leave_succeeds() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 2, 4);

    reg.leave(pid(2)).unwrap();
    let outcome = reg.join(pid(2), lobby_id).unwrap();

    assert_eq!(outcome, JoinOutcome::Joined);
}

// =========================================================================
// Start: authorization, role assignment, resets
// =========================================================================

#[test]
fn test_start_by_non_host_fails() {
    let mut reg = registry();
    lobby_of(&mut reg, 4, 4);

    let result = reg.start_game(pid(2));

    assert!(matches!(result, Err(LobbyError::NotHost(p)) if p == pid(2)));
}

#[test]
fn test_start_twice_fails_already_in_game() {
    let mut reg = registry();
    lobby_of(&mut reg, 4, 4);
    reg.start_game(pid(1)).unwrap();

    let result = reg.start_game(pid(1));

    assert!(matches!(result, Err(LobbyError::AlreadyInGame(_))));
}

#[test]
fn test_start_assigns_roles_and_resets_state() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 5, 8);

    let start = reg.start_game(pid(1)).unwrap();

    assert_eq!(start.roles.len(), 5);
    assert_eq!(start.deceivers().len(), 2, "5 players get 2 deceivers");

    let lobby = reg.get(lobby_id).unwrap();
    assert_eq!(lobby.status, LobbyStatus::InProgress);
    for seat in &lobby.seats {
        assert!(seat.alive);
        assert_eq!(seat.score, 0);
        assert!(seat.role.is_some());
    }
}

#[test]
fn test_start_from_full_lobby_succeeds() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 4, 4);
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Full);

    reg.start_game(pid(1)).unwrap();

    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::InProgress);
}

// =========================================================================
// Sabotage: eligibility, single-active, fix vs expiry
// =========================================================================

#[test]
fn test_activate_requires_running_game() {
    let mut reg = registry();
    lobby_of(&mut reg, 4, 4);

    let result = reg.activate_sabotage(pid(1), SabotageKind::Famine);

    assert!(matches!(result, Err(LobbyError::NotInProgress(_))));
}

#[test]
fn test_activate_requires_deceiver() {
    let mut reg = registry();
    let (_, _, innocent) = started_game(&mut reg, 5);

    let result = reg.activate_sabotage(innocent, SabotageKind::Famine);

    assert!(matches!(result, Err(LobbyError::RoleIneligible(p)) if p == innocent));
}

#[test]
fn test_activate_second_sabotage_fails() {
    let mut reg = registry();
    let (lobby_id, deceiver, _) = started_game(&mut reg, 5);
    reg.activate_sabotage(deceiver, SabotageKind::ConfuseLanguage)
        .unwrap();

    let result = reg.activate_sabotage(deceiver, SabotageKind::Famine);

    assert!(matches!(
        result,
        Err(LobbyError::SabotageAlreadyActive(l)) if l == lobby_id
    ));
}

#[test]
fn test_activate_critical_returns_countdown_and_generation() {
    let mut reg = registry();
    let (lobby_id, deceiver, _) = started_game(&mut reg, 5);

    let started = reg
        .activate_sabotage(deceiver, SabotageKind::EgyptianDarkness)
        .unwrap();

    assert_eq!(started.lobby_id, lobby_id);
    assert!(started.critical);
    assert_eq!(started.countdown, Some(Duration::from_secs(90)));
    assert_eq!(started.generation, 1);
}

#[test]
fn test_activate_non_critical_has_no_countdown() {
    let mut reg = registry();
    let (_, deceiver, _) = started_game(&mut reg, 5);

    let started = reg
        .activate_sabotage(deceiver, SabotageKind::ConfuseLanguage)
        .unwrap();

    assert!(!started.critical);
    assert!(started.countdown.is_none());
}

#[test]
fn test_fix_by_any_living_member_clears_sabotage() {
    let mut reg = registry();
    let (lobby_id, deceiver, innocent) = started_game(&mut reg, 5);
    reg.activate_sabotage(deceiver, SabotageKind::Famine).unwrap();

    let fixed = reg.fix_sabotage(innocent).unwrap();

    assert_eq!(fixed.kind, SabotageKind::Famine);
    assert_eq!(fixed.fixed_by, innocent);
    assert!(reg.get(lobby_id).unwrap().sabotage.is_none());
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::InProgress);
}

#[test]
fn test_fix_without_active_sabotage_fails() {
    let mut reg = registry();
    let (_, _, innocent) = started_game(&mut reg, 5);

    let result = reg.fix_sabotage(innocent);

    assert!(matches!(result, Err(LobbyError::NoActiveSabotage(_))));
}

#[test]
fn test_expiry_claim_wins_when_unfixed() {
    let mut reg = registry();
    let (lobby_id, deceiver, _) = started_game(&mut reg, 5);
    let started = reg
        .activate_sabotage(deceiver, SabotageKind::Famine)
        .unwrap();

    let expired = reg
        .claim_sabotage_expiry(lobby_id, started.generation)
        .expect("claim should succeed");

    assert_eq!(expired.winner, Role::Deceiver);
    assert_eq!(expired.reason, "famine");
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Completed);
}

#[test]
fn test_expiry_claim_after_fix_is_a_noop() {
    // The fix won the race; the timer's claim must change nothing.
    let mut reg = registry();
    let (lobby_id, deceiver, innocent) = started_game(&mut reg, 5);
    let started = reg
        .activate_sabotage(deceiver, SabotageKind::Famine)
        .unwrap();
    reg.fix_sabotage(innocent).unwrap();

    let claim = reg.claim_sabotage_expiry(lobby_id, started.generation);

    assert!(claim.is_none());
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::InProgress);
}

#[test]
fn test_fix_after_expiry_fired_is_too_late() {
    let mut reg = registry();
    let (lobby_id, deceiver, innocent) = started_game(&mut reg, 5);
    let started = reg
        .activate_sabotage(deceiver, SabotageKind::Famine)
        .unwrap();
    reg.claim_sabotage_expiry(lobby_id, started.generation)
        .unwrap();

    let result = reg.fix_sabotage(innocent);

    assert!(matches!(result, Err(LobbyError::FixTooLate(l)) if l == lobby_id));
    // The expiry outcome stands.
    assert_eq!(reg.get(lobby_id).unwrap().status, LobbyStatus::Completed);
}

#[test]
fn test_stale_generation_claim_is_a_noop() {
    // Fix the first sabotage, activate a second; the first timer's claim
    // carries generation 1 and must not end the game.
    let mut reg = registry();
    let (lobby_id, deceiver, innocent) = started_game(&mut reg, 5);
    let first = reg
        .activate_sabotage(deceiver, SabotageKind::Famine)
        .unwrap();
    reg.fix_sabotage(innocent).unwrap();
    let second = reg
        .activate_sabotage(deceiver, SabotageKind::EgyptianDarkness)
        .unwrap();
    assert_eq!(second.generation, 2);

    let claim = reg.claim_sabotage_expiry(lobby_id, first.generation);

    assert!(claim.is_none());
    let lobby = reg.get(lobby_id).unwrap();
    assert_eq!(lobby.status, LobbyStatus::InProgress);
    assert!(lobby.sabotage.is_some(), "second sabotage untouched");
}

// =========================================================================
// Liveness and reaping
// =========================================================================

#[test]
fn test_set_connected_flips_flag_without_touching_membership() {
    let mut reg = registry();
    let lobby_id = lobby_of(&mut reg, 2, 4);

    let hit = reg.set_connected(pid(2), false);

    assert_eq!(hit, Some(lobby_id));
    let lobby = reg.get(lobby_id).unwrap();
    assert!(!lobby.seat(pid(2)).unwrap().connected);
    assert_eq!(lobby.player_count(), 2);

    reg.set_connected(pid(2), true);
    assert!(reg.get(lobby_id).unwrap().seat(pid(2)).unwrap().connected);
}

#[test]
fn test_reap_removes_only_stale_fully_disconnected_lobbies() {
    let config = LobbyConfig {
        empty_reap_after: Duration::ZERO,
        ..LobbyConfig::default()
    };
    let mut reg = LobbyRegistry::new(config);

    let dead = reg.create(pid(1), "dead".into(), 4, true).unwrap();
    reg.set_connected(pid(1), false);
    let live = reg.create(pid(2), "live".into(), 4, true).unwrap();

    let reaped = reg.reap_idle();

    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].lobby_id, dead);
    assert_eq!(reaped[0].members, vec![pid(1)]);
    assert!(reg.get(dead).is_none());
    assert!(reg.get(live).is_some());
    assert_eq!(reg.lobby_of(pid(1)), None, "membership index purged");
}

#[test]
fn test_reap_never_touches_running_games() {
    let config = LobbyConfig {
        empty_reap_after: Duration::ZERO,
        ..LobbyConfig::default()
    };
    let mut reg = LobbyRegistry::new(config);
    let lobby_id = {
        let id = reg.create(pid(1), "game".into(), 4, true).unwrap();
        for p in 2..=4 {
            reg.join(pid(p), id).unwrap();
        }
        reg.start_game(pid(1)).unwrap();
        id
    };
    for p in 1..=4 {
        reg.set_connected(pid(p), false);
    }

    let reaped = reg.reap_idle();

    assert!(reaped.is_empty());
    assert!(reg.get(lobby_id).is_some());
}

#[test]
fn test_reap_spares_lobbies_inside_grace_window() {
    let mut reg = registry(); // default 900 s window
    reg.create(pid(1), "fresh".into(), 4, true).unwrap();
    reg.set_connected(pid(1), false);

    assert!(reg.reap_idle().is_empty());
}
