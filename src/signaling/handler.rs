//! WebSocket connection lifecycle
//!
//! One task pair per socket: the send task drains the connection's event
//! channel into the socket, the receive task decodes frames and dispatches
//! them to the session manager. Whichever finishes first tears the other
//! down, then the connection is removed from matchmaking.

use crate::error::Result;
use crate::matchmaking::SessionManager;
use crate::metrics::MetricsCollector;
use crate::signaling::location::{locate_client, LocationResolver};
use crate::signaling::messages::{ClientMessage, MessageUtils};
use crate::signaling::publisher::{ChannelEventPublisher, EventPublisher};
use crate::types::{IceServer, Location, ServerEvent};
use crate::utils::generate_connection_id;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared state for WebSocket connections
#[derive(Clone)]
pub struct SignalingState {
    pub manager: SessionManager,
    pub publisher: Arc<ChannelEventPublisher>,
    pub location_resolver: Arc<dyn LocationResolver>,
    pub ice_servers: Vec<IceServer>,
    pub max_message_bytes: usize,
    pub metrics_collector: Arc<MetricsCollector>,
}

/// Router exposing the signaling socket at `/ws`
pub fn router(state: SignalingState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<SignalingState>,
) -> impl IntoResponse {
    let max_message_bytes = state.max_message_bytes;

    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| async move {
            let location =
                locate_client(state.location_resolver.as_ref(), &headers, Some(peer)).await;
            handle_socket(socket, state, location).await
        })
}

async fn handle_socket(socket: WebSocket, state: SignalingState, location: Location) {
    let connection_id = generate_connection_id();
    info!(
        "New WebSocket connection - connection_id: '{}', location: {}",
        connection_id, location.code
    );

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    if !admit_connection(&state, &connection_id, location, tx) {
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize '{}' event: {}", event.name(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let connection_id = connection_id.clone();

        async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        handle_text_frame(&state, &connection_id, text.as_str());
                    }
                    Ok(Message::Binary(_)) => {
                        reject_frame(&state, &connection_id, "binary frames are not supported");
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("WebSocket error for '{}': {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    close_connection(&state, &connection_id);
    info!("WebSocket disconnected - connection_id: '{}'", connection_id);
}

/// Register the outbound channel, admit the connection and greet it
pub fn open_connection(
    state: &SignalingState,
    connection_id: &str,
    location: Location,
    sender: mpsc::UnboundedSender<ServerEvent>,
) -> Result<()> {
    state
        .publisher
        .register(connection_id.to_string(), sender)?;
    state.manager.connect(connection_id, location.clone())?;

    state.publisher.publish(
        connection_id,
        ServerEvent::ConnectionSuccess {
            connection_id: connection_id.to_string(),
            location,
            ice_servers: state.ice_servers.clone(),
        },
    )
}

/// Open the connection, undoing any partial registration on failure
pub fn admit_connection(
    state: &SignalingState,
    connection_id: &str,
    location: Location,
    sender: mpsc::UnboundedSender<ServerEvent>,
) -> bool {
    match open_connection(state, connection_id, location, sender) {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to admit connection '{}': {}", connection_id, e);
            close_connection(state, connection_id);
            false
        }
    }
}

/// Remove the connection from matchmaking, then drop its channel
pub fn close_connection(state: &SignalingState, connection_id: &str) {
    if let Err(e) = state.manager.disconnect(connection_id) {
        error!("Failed to disconnect '{}': {}", connection_id, e);
    }
    if let Err(e) = state.publisher.unregister(connection_id) {
        warn!("Failed to unregister '{}': {}", connection_id, e);
    }
}

/// Decode one text frame and apply it. Failures are reported to the sender.
pub fn handle_text_frame(state: &SignalingState, connection_id: &str, text: &str) {
    let message = match MessageUtils::parse(text, state.max_message_bytes) {
        Ok(message) => message,
        Err(e) => {
            warn!("Invalid message from '{}': {}", connection_id, e);
            reject_frame(state, connection_id, &e.to_string());
            return;
        }
    };

    let name = message.name();
    let timer = state.metrics_collector.start_timer();

    if let Err(e) = dispatch_message(&state.manager, connection_id, message) {
        error!(
            "Failed to handle '{}' from '{}': {}",
            name, connection_id, e
        );
        send_error(state, connection_id, &format!("failed to handle {}", name));
    }

    state
        .metrics_collector
        .record_operation(&format!("handle_{}", name.replace('-', "_")), timer.stop());
}

/// Apply a decoded client message to the session manager
pub fn dispatch_message(
    manager: &SessionManager,
    connection_id: &str,
    message: ClientMessage,
) -> Result<()> {
    let kind = message.signal_kind();

    match message {
        ClientMessage::SetPreferences { category, desired } => {
            manager.declare_preferences(connection_id, category, desired)?;
        }
        ClientMessage::Offer { room_id, payload }
        | ClientMessage::Answer { room_id, payload }
        | ClientMessage::IceCandidate { room_id, payload } => {
            if let Some(kind) = kind {
                manager.relay_signal(connection_id, room_id, kind, payload)?;
            }
        }
        ClientMessage::NextUser => {
            manager.request_next(connection_id)?;
        }
        ClientMessage::CancelMatch => {
            manager.cancel(connection_id)?;
        }
        ClientMessage::ReportUser { room_id, reason } => {
            manager.report(connection_id, room_id, &reason)?;
        }
    }
    Ok(())
}

fn reject_frame(state: &SignalingState, connection_id: &str, reason: &str) {
    state.metrics_collector.record_invalid_message();
    send_error(state, connection_id, &format!("invalid message: {}", reason));
}

fn send_error(state: &SignalingState, connection_id: &str, message: &str) {
    let event = ServerEvent::Error {
        message: message.to_string(),
    };
    if let Err(e) = state.publisher.publish(connection_id, event) {
        debug!("Failed to deliver error to '{}': {}", connection_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::location::FallbackLocationResolver;
    use crate::types::{Category, Placement};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn create_test_state() -> SignalingState {
        let publisher = Arc::new(ChannelEventPublisher::new());
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let manager = SessionManager::new(publisher.clone(), collector.clone(), Duration::ZERO);

        SignalingState {
            manager,
            publisher,
            location_resolver: Arc::new(FallbackLocationResolver),
            ice_servers: vec![IceServer::stun("stun:stun.l.google.com:19302")],
            max_message_bytes: 4096,
            metrics_collector: collector,
        }
    }

    fn open_test_connection(state: &SignalingState, id: &str) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        open_connection(state, id, Location::unknown(), tx).unwrap();
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_open_connection_greets_client() {
        let state = create_test_state();
        let mut rx = open_test_connection(&state, "a");

        match drain(&mut rx).as_slice() {
            [ServerEvent::ConnectionSuccess {
                connection_id,
                ice_servers,
                ..
            }] => {
                assert_eq!(connection_id, "a");
                assert_eq!(ice_servers.len(), 1);
            }
            other => panic!("unexpected events: {:?}", other),
        }
        assert_eq!(state.manager.stats().unwrap().connected, 1);
        assert_eq!(state.publisher.connection_count(), 1);
    }

    #[test]
    fn test_failed_admission_leaves_nothing_behind() {
        let state = create_test_state();
        let (tx, rx) = mpsc::unbounded_channel();
        // Socket already gone: the greeting cannot be delivered
        drop(rx);

        assert!(!admit_connection(&state, "a", Location::unknown(), tx));
        assert_eq!(state.manager.stats().unwrap().connected, 0);
        assert_eq!(state.publisher.connection_count(), 0);

        let mut rx_b = open_test_connection(&state, "b");
        assert_eq!(drain(&mut rx_b).len(), 1);
        assert_eq!(state.manager.stats().unwrap().connected, 1);
    }

    #[test]
    fn test_frames_drive_matching_and_relay() {
        let state = create_test_state();
        let mut rx_a = open_test_connection(&state, "a");
        let mut rx_b = open_test_connection(&state, "b");

        handle_text_frame(
            &state,
            "a",
            r#"{"type":"set-preferences","gender":"male","preference":"female"}"#,
        );
        handle_text_frame(
            &state,
            "b",
            r#"{"type":"set-preferences","gender":"female","preference":"both"}"#,
        );

        let room_id = match state.manager.placement_of("a").unwrap() {
            Some(Placement::InRoom(room_id)) => room_id,
            other => panic!("a is not paired: {:?}", other),
        };
        drain(&mut rx_a);
        drain(&mut rx_b);

        let offer = json!({"type": "offer", "roomId": room_id, "offer": {"sdp": "v=0"}});
        handle_text_frame(&state, "b", &offer.to_string());

        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::Offer {
                room_id,
                from: "b".to_string(),
                payload: json!({"sdp": "v=0"}),
            }]
        );
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_invalid_frame_reports_error_to_sender() {
        let state = create_test_state();
        let mut rx = open_test_connection(&state, "a");
        drain(&mut rx);

        handle_text_frame(&state, "a", "{not json");

        match drain(&mut rx).as_slice() {
            [ServerEvent::Error { message }] => assert!(message.starts_with("invalid message")),
            other => panic!("unexpected events: {:?}", other),
        }
        assert_eq!(
            state.manager.placement_of("a").unwrap(),
            Some(Placement::Idle)
        );
    }

    #[test]
    fn test_close_connection_releases_partner() {
        let state = create_test_state();
        let _rx_a = open_test_connection(&state, "a");
        let mut rx_b = open_test_connection(&state, "b");

        dispatch_message(
            &state.manager,
            "a",
            ClientMessage::SetPreferences {
                category: Category::Female,
                desired: Category::Male,
            },
        )
        .unwrap();
        dispatch_message(
            &state.manager,
            "b",
            ClientMessage::SetPreferences {
                category: Category::Male,
                desired: Category::Female,
            },
        )
        .unwrap();
        drain(&mut rx_b);

        close_connection(&state, "a");
        close_connection(&state, "a");

        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "partner-left");
        assert_eq!(events[1], ServerEvent::WaitingForMatch);
        assert_eq!(state.publisher.connection_count(), 1);
        state.manager.check_invariants().unwrap();
    }
}
