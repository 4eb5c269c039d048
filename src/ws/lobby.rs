//! Lobby message handlers
//!
//! Membership, settings, chat and resync requests.

use super::handlers::{ack, reply};
use super::Session;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use serde_json::{Map, Value};
use std::sync::Arc;

pub async fn handle_create_lobby(state: &Arc<AppState>, session: &Session, name: String) -> Option<ServerMessage> {
    tracing::info!("Create lobby request from {}", session.player_id);
    reply(
        state
            .create_lobby(&session.player_id, &session.connection_id, &name)
            .await,
    )
}

pub async fn handle_join_lobby(
    state: &Arc<AppState>,
    session: &Session,
    name: String,
    code: String,
) -> Option<ServerMessage> {
    tracing::info!("Join request from {} for lobby {}", session.player_id, code);
    reply(
        state
            .join_lobby(&session.player_id, &session.connection_id, &name, &code)
            .await,
    )
}

pub async fn handle_leave_lobby(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    reply(state.leave_lobby(&session.player_id).await)
}

pub async fn handle_start_game(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    ack(state.start_game(&session.player_id).await)
}

pub async fn handle_update_settings(
    state: &Arc<AppState>,
    session: &Session,
    settings: Map<String, Value>,
) -> Option<ServerMessage> {
    ack(state.update_settings(&session.player_id, &settings).await)
}

pub async fn handle_send_message(state: &Arc<AppState>, session: &Session, text: String) -> Option<ServerMessage> {
    ack(state.send_chat(&session.player_id, &text).await)
}

pub async fn handle_request_state(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    reply(state.state_for(&session.player_id).await)
}
