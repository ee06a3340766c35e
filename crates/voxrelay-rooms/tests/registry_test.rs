//! Tests for room lifecycle: lazy creation, idempotent joins, synchronous
//! deletion when empty, and connection-wide cleanup.

use uuid::Uuid;
use voxrelay_rooms::{
    Departure, JoinOutcome, MicCoordinator, MicDecision, RoomRegistry, SynthesisClaim,
};

#[test]
fn room_created_on_first_join_and_deleted_when_empty() {
    let registry = RoomRegistry::new();
    let conn = Uuid::new_v4();

    assert!(!registry.room_exists("r1"));

    assert_eq!(registry.join("r1", conn, "Alice"), JoinOutcome::Joined);
    assert!(registry.room_exists("r1"));

    let departure = registry.leave("r1", conn).expect("Alice is a participant");
    assert_eq!(
        departure,
        Departure {
            display_name: "Alice".to_string(),
            room_deleted: true,
            mic_released: None,
        }
    );
    assert!(!registry.room_exists("r1"), "empty room must be deleted");
}

#[test]
fn rejoin_with_same_display_name_is_noop() {
    let registry = RoomRegistry::new();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    assert_eq!(registry.join("r1", first, "Alice"), JoinOutcome::Joined);
    assert_eq!(registry.join("r1", second, "Alice"), JoinOutcome::Rejoined);

    let participants = registry.participants("r1");
    assert_eq!(participants.len(), 1, "no duplicate membership");
    assert_eq!(participants[0].connection_id, first);
}

#[test]
fn participants_are_ordered_by_join_time() {
    let registry = RoomRegistry::new();
    registry.join("r1", Uuid::new_v4(), "Alice");
    registry.join("r1", Uuid::new_v4(), "Bob");
    registry.join("r1", Uuid::new_v4(), "Carol");

    let names: Vec<_> = registry
        .participants("r1")
        .into_iter()
        .map(|p| p.display_name)
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
}

#[test]
fn leave_keeps_room_alive_while_others_remain() {
    let registry = RoomRegistry::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    registry.join("r1", alice, "Alice");
    registry.join("r1", bob, "Bob");

    let departure = registry.leave("r1", alice).expect("Alice is a participant");
    assert!(!departure.room_deleted);
    assert!(registry.room_exists("r1"));

    let departure = registry.leave("r1", bob).expect("Bob is a participant");
    assert!(departure.room_deleted);
    assert!(!registry.room_exists("r1"));
}

#[test]
fn leave_unknown_room_or_stranger_is_none() {
    let registry = RoomRegistry::new();
    let conn = Uuid::new_v4();

    assert!(registry.leave("ghost", conn).is_none());

    registry.join("r1", Uuid::new_v4(), "Alice");
    assert!(registry.leave("r1", conn).is_none());
    assert!(registry.room_exists("r1"), "failed leave must not mutate");
}

#[test]
fn remove_connection_cleans_all_rooms() {
    let registry = RoomRegistry::new();
    let conn = Uuid::new_v4();
    let other = Uuid::new_v4();

    // The contract tolerates a connection present in more than one room.
    registry.join("r1", conn, "Alice");
    registry.join("r2", conn, "Alice");
    registry.join("r2", other, "Bob");

    let mut exits = registry.remove_connection(conn);
    exits.sort_by(|a, b| a.room_code.cmp(&b.room_code));

    assert_eq!(exits.len(), 2);
    assert_eq!(exits[0].room_code, "r1");
    assert!(exits[0].room_deleted, "r1 had only Alice");
    assert_eq!(exits[1].room_code, "r2");
    assert!(!exits[1].room_deleted, "Bob keeps r2 alive");

    assert!(!registry.room_exists("r1"));
    assert!(registry.room_exists("r2"));
}

#[test]
fn leave_releases_held_mic_in_the_same_operation() {
    let registry = RoomRegistry::new();
    let mic = MicCoordinator::new(&registry);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    registry.join("r1", alice, "Alice");
    registry.join("r1", bob, "Bob");
    mic.request_hold("r1", alice);

    let departure = registry.leave("r1", alice).expect("Alice is a participant");
    assert_eq!(departure.mic_released.as_deref(), Some("Alice"));

    // No window where the mic still names the departed holder: the very
    // next hold request succeeds.
    assert!(mic.current_holder("r1").is_none());
    assert_eq!(
        mic.request_hold("r1", bob),
        MicDecision::Granted {
            display_name: "Bob".to_string()
        }
    );
}

#[test]
fn leave_by_non_holder_reports_no_release() {
    let registry = RoomRegistry::new();
    let mic = MicCoordinator::new(&registry);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    registry.join("r1", alice, "Alice");
    registry.join("r1", bob, "Bob");
    mic.request_hold("r1", alice);

    let departure = registry.leave("r1", bob).expect("Bob is a participant");
    assert!(departure.mic_released.is_none());
    assert_eq!(mic.current_holder("r1").as_deref(), Some("Alice"));
}

#[test]
fn remove_connection_for_unknown_connection_is_empty() {
    let registry = RoomRegistry::new();
    registry.join("r1", Uuid::new_v4(), "Alice");

    assert!(registry.remove_connection(Uuid::new_v4()).is_empty());
    assert!(registry.room_exists("r1"));
}

#[test]
fn synthesis_claim_is_exclusive_per_room() {
    let registry = RoomRegistry::new();
    registry.join("r1", Uuid::new_v4(), "Alice");
    registry.join("r2", Uuid::new_v4(), "Bob");

    let claim = registry.begin_synthesis("r1");
    let SynthesisClaim::Started(guard) = claim else {
        panic!("first claim should start");
    };
    assert!(registry.synthesis_in_flight("r1"));

    assert!(matches!(registry.begin_synthesis("r1"), SynthesisClaim::Busy));

    // Rooms are independent: r2 can still start.
    assert!(matches!(
        registry.begin_synthesis("r2"),
        SynthesisClaim::Started(_)
    ));

    drop(guard);
    assert!(!registry.synthesis_in_flight("r1"), "drop clears the flag");
    assert!(matches!(
        registry.begin_synthesis("r1"),
        SynthesisClaim::Started(_)
    ));
}

#[test]
fn synthesis_claim_on_unknown_room_is_not_found() {
    let registry = RoomRegistry::new();
    assert!(matches!(
        registry.begin_synthesis("ghost"),
        SynthesisClaim::RoomNotFound
    ));
}

#[test]
fn synthesis_guard_survives_room_deletion() {
    let registry = RoomRegistry::new();
    let conn = Uuid::new_v4();
    registry.join("r1", conn, "Alice");

    let SynthesisClaim::Started(guard) = registry.begin_synthesis("r1") else {
        panic!("claim should start");
    };

    // Room vanishes mid-synthesis (everyone disconnected).
    registry.leave("r1", conn);
    assert!(!registry.room_exists("r1"));

    // Dropping the guard after deletion is a benign no-op.
    drop(guard);

    // A recreated room starts with a clear flag.
    registry.join("r1", Uuid::new_v4(), "Bob");
    assert!(!registry.synthesis_in_flight("r1"));
}
