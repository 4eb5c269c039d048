//! In-game message handlers

use super::handlers::ack;
use super::Session;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;

/// Confirmation goes to the actor privately through the lobby's deliveries
pub async fn handle_night_action(
    state: &Arc<AppState>,
    session: &Session,
    target_id: String,
) -> Option<ServerMessage> {
    tracing::debug!("Night action from {} on {}", session.player_id, target_id);
    ack(state.submit_night_action(&session.player_id, &target_id).await)
}

pub async fn handle_cast_vote(state: &Arc<AppState>, session: &Session, target_id: String) -> Option<ServerMessage> {
    tracing::debug!("Vote from {} for {}", session.player_id, target_id);
    ack(state.cast_vote(&session.player_id, &target_id).await)
}
