//! Test fixtures and helpers shared by the integration tests

#![allow(dead_code)]

use pairline::matchmaking::SessionManager;
use pairline::metrics::MetricsCollector;
use pairline::signaling::MockEventPublisher;
use pairline::types::{Category, Location, Placement, RoomId, ServerEvent};
use std::sync::Arc;
use std::time::Duration;

/// Create a session manager wired to a recording publisher
pub fn create_test_system(rematch_delay: Duration) -> (SessionManager, Arc<MockEventPublisher>) {
    let event_publisher = Arc::new(MockEventPublisher::new());
    let metrics_collector =
        Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
    let manager = SessionManager::new(event_publisher.clone(), metrics_collector, rematch_delay);
    (manager, event_publisher)
}

/// Connect participants with the given ids
pub fn connect_participants(manager: &SessionManager, ids: &[&str]) {
    for id in ids {
        manager
            .connect(id, Location::unknown())
            .expect("Failed to connect participant");
    }
}

/// Connect `count` participants named `{prefix}_{n}`
pub fn create_test_participants(manager: &SessionManager, prefix: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|n| {
            let id = format!("{}_{}", prefix, n);
            manager
                .connect(&id, Location::unknown())
                .expect("Failed to connect participant");
            id
        })
        .collect()
}

pub fn declare(manager: &SessionManager, id: &str, category: Category, desired: Category) {
    manager
        .declare_preferences(id, category, desired)
        .expect("Failed to declare preferences");
}

/// Room the participant currently sits in; panics when it is not paired
pub fn room_of(manager: &SessionManager, id: &str) -> RoomId {
    match manager.placement_of(id).expect("Failed to read placement") {
        Some(Placement::InRoom(room_id)) => room_id,
        other => panic!("'{}' is not in a room: {:?}", id, other),
    }
}

/// Partner id named in the latest `match-found` event for `id`
pub fn matched_partner(publisher: &MockEventPublisher, id: &str) -> Option<String> {
    publisher
        .events_for(id)
        .into_iter()
        .rev()
        .find_map(|event| match event {
            ServerEvent::MatchFound { partner, .. } => Some(partner.id),
            _ => None,
        })
}

/// Wire names of the events delivered to `id`, in order
pub fn event_names(publisher: &MockEventPublisher, id: &str) -> Vec<&'static str> {
    publisher
        .events_for(id)
        .iter()
        .map(|event| event.name())
        .collect()
}
