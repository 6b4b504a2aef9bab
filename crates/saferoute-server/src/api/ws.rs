//! WebSocket map sessions for the live danger overlay.
//!
//! Each connection owns one coordinator. The client sends route requests
//! and clears; the server answers with `draw` frames that replace the whole
//! danger layer, `clear` frames, and `no_route` notices.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use saferoute_core::models::{DangerSegment, GeoPoint};
use saferoute_overlay::{MapOverlayRenderer, OverlayOutcome, RouteOverlayCoordinator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Route { start: [f64; 2], end: [f64; 2] },
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Replaces everything currently drawn
    Draw {
        generation: u64,
        risk_generation: u64,
        segments: Vec<Vec<[f64; 2]>>,
    },
    Clear,
    NoRoute { generation: u64, reason: String },
    Error { message: String },
}

#[derive(Debug)]
enum Frame {
    Draw(Vec<Vec<[f64; 2]>>),
    Clear,
}

/// Forwards overlay mutations to the socket task.
pub struct SessionRenderer {
    tx: mpsc::UnboundedSender<Frame>,
}

impl MapOverlayRenderer for SessionRenderer {
    fn draw(&mut self, segments: &[DangerSegment]) {
        let segments = segments.iter().map(DangerSegment::to_lat_lngs).collect();
        let _ = self.tx.send(Frame::Draw(segments));
    }

    fn clear(&mut self) {
        let _ = self.tx.send(Frame::Clear);
    }

    // A draw frame already replaces the layer on the client.
    fn replace(&mut self, segments: &[DangerSegment]) {
        self.draw(segments);
    }
}

/// One map session: a coordinator plus the frames it has produced.
pub struct OverlaySession {
    coordinator: RouteOverlayCoordinator<SessionRenderer>,
    frames: mpsc::UnboundedReceiver<Frame>,
}

impl OverlaySession {
    pub fn new(state: &AppState) -> Self {
        let (tx, frames) = mpsc::unbounded_channel();
        let coordinator = RouteOverlayCoordinator::new(
            state.zones().clone(),
            state.routes(),
            SessionRenderer { tx },
            state.predictor().rules().segmentation_config(),
        );
        Self { coordinator, frames }
    }

    /// Apply one client text frame.
    pub fn on_text(&mut self, text: &str) -> Vec<ServerMessage> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(err) => {
                return vec![ServerMessage::Error {
                    message: format!("invalid message: {}", err),
                }]
            }
        };

        match message {
            ClientMessage::Route { start, end } => {
                let (start, end) = (GeoPoint::from(start), GeoPoint::from(end));
                if !start.is_valid() || !end.is_valid() {
                    return vec![ServerMessage::Error {
                        message: format!("invalid coordinate: {} -> {}", start, end),
                    }];
                }
                self.coordinator.request_route(start, end);
            }
            ClientMessage::Clear => {
                self.coordinator.clear_route();
            }
        }
        self.drain(None)
    }

    /// Wait for the coordinator's next outcome. `None` once it has stopped.
    pub async fn next_messages(&mut self) -> Option<Vec<ServerMessage>> {
        let outcome = self.coordinator.step().await?;
        Some(self.drain(Some(outcome)))
    }

    pub fn dispose(&mut self) {
        self.coordinator.dispose();
    }

    fn drain(&mut self, outcome: Option<OverlayOutcome>) -> Vec<ServerMessage> {
        let (generation, risk_generation) = self
            .coordinator
            .rendered()
            .map(|rendered| (rendered.generations.route.0, rendered.generations.risk.0))
            .unwrap_or((self.coordinator.latest_route_generation().0, 0));

        let mut messages = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            messages.push(match frame {
                Frame::Draw(segments) => ServerMessage::Draw {
                    generation,
                    risk_generation,
                    segments,
                },
                Frame::Clear => ServerMessage::Clear,
            });
        }
        if let Some(OverlayOutcome::NoRoute(err)) = outcome {
            messages.push(ServerMessage::NoRoute {
                generation: self.coordinator.latest_route_generation().0,
                reason: err.to_string(),
            });
        }
        messages
    }
}

/// Handler for overlay WebSocket connections.
pub async fn overlay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    let open = state.overlay_session_opened();
    tracing::info!("Overlay session {} opened ({} active)", session_id, open);

    let mut session = OverlaySession::new(&state);

    loop {
        let messages = tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => session.on_text(&text),
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => break,
                }
            }
            messages = session.next_messages() => {
                match messages {
                    Some(messages) => messages,
                    None => break,
                }
            }
        };

        if !send_all(&mut socket, messages).await {
            break;
        }
    }

    session.dispose();
    state.overlay_session_closed();
    tracing::info!("Overlay session {} closed", session_id);
}

async fn send_all(socket: &mut WebSocket, messages: Vec<ServerMessage>) -> bool {
    for message in messages {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("Failed to encode overlay message: {}", err);
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            return false;
        }
    }
    true
}
