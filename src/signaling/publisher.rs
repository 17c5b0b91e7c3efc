//! Outbound event delivery to connected clients

use crate::error::{MatchError, Result};
use crate::types::{ConnectionId, ServerEvent};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// Trait for delivering events to a single connection.
///
/// Implementations must not block: the session manager publishes while it
/// holds its state lock so that per-connection event order matches state
/// transition order.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, connection_id: &str, event: ServerEvent) -> Result<()>;
}

/// Publisher backed by one unbounded channel per WebSocket connection
#[derive(Debug, Default)]
pub struct ChannelEventPublisher {
    channels: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl ChannelEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the outbound channel of a new connection
    pub fn register(
        &self,
        connection_id: ConnectionId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<()> {
        let mut channels = self
            .channels
            .write()
            .map_err(|_| MatchError::InternalError {
                message: "Failed to acquire channels lock".to_string(),
            })?;
        channels.insert(connection_id, sender);
        Ok(())
    }

    /// Detach the outbound channel of a closed connection
    pub fn unregister(&self, connection_id: &str) -> Result<bool> {
        let mut channels = self
            .channels
            .write()
            .map_err(|_| MatchError::InternalError {
                message: "Failed to acquire channels lock".to_string(),
            })?;
        Ok(channels.remove(connection_id).is_some())
    }

    pub fn connection_count(&self) -> usize {
        self.channels
            .read()
            .map(|channels| channels.len())
            .unwrap_or(0)
    }
}

impl EventPublisher for ChannelEventPublisher {
    fn publish(&self, connection_id: &str, event: ServerEvent) -> Result<()> {
        let channels = self
            .channels
            .read()
            .map_err(|_| MatchError::InternalError {
                message: "Failed to acquire channels lock".to_string(),
            })?;

        let sender = channels
            .get(connection_id)
            .ok_or_else(|| MatchError::ParticipantNotFound {
                connection_id: connection_id.to_string(),
            })?;

        let name = event.name();
        sender.send(event).map_err(|_| MatchError::InternalError {
            message: format!("Outbound channel closed for '{}'", connection_id),
        })?;

        debug!("Queued '{}' event for '{}'", name, connection_id);
        Ok(())
    }
}

/// Mock event publisher that records every event (for testing)
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: Mutex<Vec<(ConnectionId, ServerEvent)>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events in delivery order
    pub fn get_published_events(&self) -> Vec<(ConnectionId, ServerEvent)> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events delivered to one connection, in order
    pub fn events_for(&self, connection_id: &str) -> Vec<ServerEvent> {
        self.get_published_events()
            .into_iter()
            .filter(|(to, _)| to == connection_id)
            .map(|(_, event)| event)
            .collect()
    }

    /// Count events with the given wire name
    pub fn count_events_of_type(&self, name: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|(_, event)| event.name() == name)
            .count()
    }

    /// Clear published events
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

impl EventPublisher for MockEventPublisher {
    fn publish(&self, connection_id: &str, event: ServerEvent) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push((connection_id.to_string(), event));
        }
        Ok(())
    }
}
