//! Concurrency and invariant stress tests for the session manager
//!
//! Many threads declare, relay and leave at once; afterwards every room must
//! hold two distinct participants and nobody may have been matched twice.
//! A property test replays random operation sequences and checks the
//! registry invariants after every step.

mod fixtures;

use pairline::types::{Category, Location, Placement, ServerEvent, SignalKind};
use pairline::SessionManager;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use uuid::Uuid;

use fixtures::create_test_system;

#[test]
fn test_concurrent_declarations_never_double_match() {
    let (manager, publisher) = create_test_system(Duration::ZERO);
    let threads = 8;
    let per_thread = 50;

    let start_time = Instant::now();
    std::thread::scope(|scope| {
        for t in 0..threads {
            let manager = manager.clone();
            scope.spawn(move || {
                for n in 0..per_thread {
                    let id = format!("t{}_{}", t, n);
                    manager.connect(&id, Location::unknown()).unwrap();
                    let (category, desired) = match (t + n) % 3 {
                        0 => (Category::Male, Category::Female),
                        1 => (Category::Female, Category::Male),
                        _ => (Category::Female, Category::Both),
                    };
                    manager
                        .declare_preferences(&id, category, desired)
                        .unwrap();
                }
            });
        }
    });
    let elapsed = start_time.elapsed();

    manager.check_invariants().unwrap();

    let stats = manager.stats().unwrap();
    assert_eq!(stats.connected, threads * per_thread);
    assert_eq!(stats.active_rooms * 2 + stats.waiting_total, threads * per_thread);
    assert_eq!(
        publisher.count_events_of_type("match-found"),
        stats.active_rooms * 2
    );

    // Nobody is matched twice
    let mut matched = HashSet::new();
    for (to, event) in publisher.get_published_events() {
        if let ServerEvent::MatchFound { .. } = event {
            assert!(matched.insert(to.clone()), "'{}' matched twice", to);
        }
    }

    println!(
        "✅ Concurrent declarations test passed - {} participants, {} rooms in {:?}",
        stats.connected, stats.active_rooms, elapsed
    );
}

#[test]
fn test_concurrent_churn_keeps_invariants() {
    let (manager, _publisher) = create_test_system(Duration::ZERO);
    let threads = 6;
    let rounds = 40;

    std::thread::scope(|scope| {
        for t in 0..threads {
            let manager = manager.clone();
            scope.spawn(move || {
                for n in 0..rounds {
                    let id = format!("c{}_{}", t, n);
                    manager.connect(&id, Location::unknown()).unwrap();
                    let category = if n % 2 == 0 {
                        Category::Male
                    } else {
                        Category::Female
                    };
                    manager
                        .declare_preferences(&id, category, Category::Both)
                        .unwrap();

                    if let Ok(Some(Placement::InRoom(room_id))) = manager.placement_of(&id) {
                        manager
                            .relay_signal(&id, room_id, SignalKind::Offer, json!({"sdp": n}))
                            .unwrap();
                    }

                    match n % 4 {
                        0 => {
                            manager.disconnect(&id).unwrap();
                        }
                        1 => {
                            manager.request_next(&id).unwrap();
                        }
                        2 => {
                            manager.cancel(&id).unwrap();
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    manager.check_invariants().unwrap();
    let stats = manager.stats().unwrap();
    assert_eq!(stats.pending_rematches, 0);
    assert_eq!(stats.connected, threads * rounds - threads * (rounds / 4));

    println!("✅ Concurrent churn test passed - {:?}", stats);
}

#[test]
fn test_invariant_walk_stays_cheap_with_thousands_waiting() {
    let (manager, _publisher) = create_test_system(Duration::ZERO);
    let waiting = 5_000;

    for n in 0..waiting {
        let id = format!("w{}", n);
        manager.connect(&id, Location::unknown()).unwrap();
        manager
            .declare_preferences(&id, Category::Male, Category::Female)
            .unwrap();
    }
    assert_eq!(manager.stats().unwrap().waiting_male, waiting);

    let start_time = Instant::now();
    manager.check_invariants().unwrap();
    let elapsed = start_time.elapsed();

    // Linear in the number of connections; a per-entry pool scan would take
    // seconds here in an unoptimised build
    assert!(
        elapsed < Duration::from_millis(250),
        "invariant walk over {} waiters took {:?}",
        waiting,
        elapsed
    );

    println!(
        "✅ Invariant walk test passed - {} waiting checked in {:?}",
        waiting, elapsed
    );
}

#[derive(Debug, Clone)]
enum Operation {
    Connect(usize),
    Declare(usize, Category, Category),
    Relay(usize),
    RelayToStrangerRoom(usize),
    Next(usize),
    Cancel(usize),
    Report(usize),
    Disconnect(usize),
    Rematch(usize),
}

fn category_strategy() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Male),
        Just(Category::Female),
        Just(Category::Both),
    ]
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    let id = 0..6usize;
    prop_oneof![
        2 => id.clone().prop_map(Operation::Connect),
        4 => (id.clone(), category_strategy(), category_strategy())
            .prop_map(|(n, category, desired)| Operation::Declare(n, category, desired)),
        1 => id.clone().prop_map(Operation::Relay),
        1 => id.clone().prop_map(Operation::RelayToStrangerRoom),
        1 => id.clone().prop_map(Operation::Next),
        1 => id.clone().prop_map(Operation::Cancel),
        1 => id.clone().prop_map(Operation::Report),
        2 => id.clone().prop_map(Operation::Disconnect),
        1 => id.prop_map(Operation::Rematch),
    ]
}

fn apply(manager: &SessionManager, operation: &Operation) {
    let name = |n: &usize| format!("p{}", n);

    // Operations on unknown connections may fail; that is expected here
    match operation {
        Operation::Connect(n) => {
            let _ = manager.connect(&name(n), Location::unknown());
        }
        Operation::Declare(n, category, desired) => {
            let _ = manager.declare_preferences(&name(n), *category, *desired);
        }
        Operation::Relay(n) => {
            if let Ok(Some(Placement::InRoom(room_id))) = manager.placement_of(&name(n)) {
                assert!(manager
                    .relay_signal(&name(n), room_id, SignalKind::Answer, json!({}))
                    .unwrap());
            }
        }
        Operation::RelayToStrangerRoom(n) => {
            assert!(!manager
                .relay_signal(&name(n), Uuid::new_v4(), SignalKind::IceCandidate, json!({}))
                .unwrap());
        }
        Operation::Next(n) => {
            let _ = manager.request_next(&name(n));
        }
        Operation::Cancel(n) => {
            let _ = manager.cancel(&name(n));
        }
        Operation::Report(n) => {
            let _ = manager.report(&name(n), Uuid::new_v4(), "stress");
        }
        Operation::Disconnect(n) => {
            manager.disconnect(&name(n)).unwrap();
        }
        Operation::Rematch(n) => {
            manager.run_rematch(&name(n)).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_random_operations_keep_invariants(
        operations in proptest::collection::vec(operation_strategy(), 1..60)
    ) {
        let (manager, _publisher) = create_test_system(Duration::ZERO);

        for operation in &operations {
            apply(&manager, operation);
            if let Err(e) = manager.check_invariants() {
                return Err(TestCaseError::fail(format!("after {:?}: {}", operation, e)));
            }
        }

        let stats = manager.stats().unwrap();
        prop_assert_eq!(stats.pending_rematches, 0);
        prop_assert!(stats.active_rooms * 2 + stats.waiting_total <= stats.connected);
    }
}
