//! WebSocket message dispatch
//!
//! Entry point for client messages. Lobby and game handlers live in their
//! own modules; errors become a single `error` reply to the sender.

use crate::error::GameResult;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{game, lobby, Session};

/// A command that answers the sender directly
pub(crate) fn reply(result: GameResult<ServerMessage>) -> Option<ServerMessage> {
    match result {
        Ok(msg) => Some(msg),
        Err(e) => Some(e.into()),
    }
}

/// A command whose effects arrive through the lobby's deliveries
pub(crate) fn ack(result: GameResult<()>) -> Option<ServerMessage> {
    result.err().map(Into::into)
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::CreateLobby { name } => lobby::handle_create_lobby(state, session, name).await,

        ClientMessage::JoinLobby { name, code } => {
            lobby::handle_join_lobby(state, session, name, code).await
        }

        ClientMessage::LeaveLobby => lobby::handle_leave_lobby(state, session).await,

        ClientMessage::StartGame => lobby::handle_start_game(state, session).await,

        ClientMessage::UpdateSettings { settings } => {
            lobby::handle_update_settings(state, session, settings).await
        }

        ClientMessage::SendMessage { text } => lobby::handle_send_message(state, session, text).await,

        ClientMessage::RequestState => lobby::handle_request_state(state, session).await,

        ClientMessage::NightAction { target_id } => {
            game::handle_night_action(state, session, target_id).await
        }

        ClientMessage::CastVote { target_id } => game::handle_cast_vote(state, session, target_id).await,
    }
}
