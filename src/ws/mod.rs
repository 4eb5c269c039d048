pub mod game;
pub mod handlers;
pub mod lobby;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, PlayerId};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Identity persisted by the browser; minted when missing or malformed
    pub player_id: Option<String>,
}

/// Who is on the other end of one socket
#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: PlayerId,
    pub connection_id: ConnectionId,
}

impl Session {
    pub fn from_query(params: &WsQuery) -> Self {
        let player_id = params
            .player_id
            .as_deref()
            .map(str::trim)
            .filter(|id| ulid::Ulid::from_string(id).is_ok())
            .map(str::to_string)
            .unwrap_or_else(|| ulid::Ulid::new().to_string());

        Self {
            player_id,
            connection_id: ulid::Ulid::new().to_string(),
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let session = Session::from_query(&params);
    tracing::info!(
        "WebSocket connection request: player_id={}, connection={}",
        session.player_id,
        session.connection_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, session, state))
}

/// Serialize and send; false once the socket is gone
async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, session: Session, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        player_id: session.player_id.clone(),
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    // Subscribe before reattaching so the presence update is not missed
    let mut outbound_rx = state.outbound.subscribe();

    if let Some(resync) = state
        .reconnect(&session.player_id, &session.connection_id)
        .await
    {
        if !send(&mut sender, &resync).await {
            state
                .disconnect(&session.player_id, &session.connection_id)
                .await;
            return;
        }
    }

    loop {
        tokio::select! {
            envelope = outbound_rx.recv() => {
                match envelope {
                    Ok(envelope) => {
                        if envelope.is_for(&session.player_id)
                            && !send(&mut sender, &envelope.message).await
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Connection {} lagged, skipped {} messages",
                            session.connection_id,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from {}: {}", session.player_id, text);

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &session, &state).await,
                            Err(e) => {
                                tracing::debug!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(response) = response {
                            if !send(&mut sender, &response).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by {}", session.player_id);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state
        .disconnect(&session.player_id, &session.connection_id)
        .await;
    tracing::info!("WebSocket connection closed for {}", session.player_id);
}
