//! Player commands against the registry
//!
//! Each command locks one lobby, mutates it, and flushes the resulting
//! outbox before releasing the lock.

use super::lobby::Lobby;
use super::player::{generate_lobby_code, normalize_code, validate_name, PlayerRecord};
use super::{AppState, SharedLobby};
use crate::broadcast::Outbox;
use crate::error::{GameError, GameResult};
use crate::protocol::{LobbySnapshot, ServerMessage};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

impl AppState {
    async fn lobby_of(&self, player_id: &str) -> GameResult<SharedLobby> {
        let code = self
            .session_of(player_id)
            .await
            .ok_or_else(|| GameError::validation("You are not in a lobby"))?;
        self.get_lobby(&code)
            .await
            .ok_or_else(|| GameError::validation("Lobby not found"))
    }

    /// Run a mutation on the player's lobby and deliver what it produced
    async fn mutate<F>(&self, player_id: &str, f: F) -> GameResult<()>
    where
        F: FnOnce(&mut Lobby) -> GameResult<Outbox>,
    {
        let handle = self.lobby_of(player_id).await?;
        let mut lobby = handle.lock().await;
        let out = f(&mut *lobby)?;
        self.flush(&lobby, out);
        self.settle(&handle, lobby).await;
        Ok(())
    }

    /// Reap seats whose players walked away from a game, then drop the
    /// lobby from the registry if it is closed. Takes the guard so the
    /// registry is only locked after the lobby is released.
    pub(crate) async fn settle(&self, handle: &SharedLobby, mut lobby: MutexGuard<'_, Lobby>) {
        if lobby.game.is_some() {
            let code = lobby.code.clone();
            let out = {
                let sessions = self.sessions.read().await;
                lobby.reap_departed(|id| sessions.get(id) == Some(&code))
            };
            self.flush(&lobby, out);
        }

        let (code, closed) = (lobby.code.clone(), lobby.is_closed());
        drop(lobby);
        if !closed {
            return;
        }
        let mut lobbies = self.lobbies.write().await;
        if lobbies.get(&code).is_some_and(|l| Arc::ptr_eq(l, handle)) {
            lobbies.remove(&code);
            tracing::info!("Lobby {} closed", code);
        }
    }

    pub async fn create_lobby(&self, player_id: &str, connection: &str, name: &str) -> GameResult<ServerMessage> {
        let name = validate_name(name)?;
        if self.session_of(player_id).await.is_some() {
            return Err(GameError::validation("Already in a lobby"));
        }

        let creator = PlayerRecord::new(player_id.to_string(), name).with_connection(connection.to_string());
        let settings = self.config.lobby_defaults.clone();

        let mut lobbies = self.lobbies.write().await;
        let code = loop {
            let code = generate_lobby_code();
            if !lobbies.contains_key(&code) {
                break code;
            }
        };
        let lobby = Lobby::new(code.clone(), creator, settings);
        let snapshot = lobby.snapshot();
        lobbies.insert(code.clone(), Arc::new(Mutex::new(lobby)));
        self.sessions
            .write()
            .await
            .insert(player_id.to_string(), code.clone());

        tracing::info!("Lobby {} created by {}", code, player_id);
        Ok(ServerMessage::LobbyJoined { lobby: snapshot })
    }

    pub async fn join_lobby(
        &self,
        player_id: &str,
        connection: &str,
        name: &str,
        code: &str,
    ) -> GameResult<ServerMessage> {
        let code = normalize_code(code);
        let name = validate_name(name)?;

        if let Some(current) = self.session_of(player_id).await {
            if current != code {
                return Err(GameError::validation("Already in another lobby"));
            }
            if let Some(state) = self.reconnect(player_id, connection).await {
                return Ok(state);
            }
            // Stale session: the seat is gone, join afresh
            self.sessions.write().await.remove(player_id);
        }

        let handle = self
            .get_lobby(&code)
            .await
            .ok_or_else(|| GameError::validation("Lobby not found"))?;
        let mut lobby = handle.lock().await;

        let record = PlayerRecord::new(player_id.to_string(), name).with_connection(connection.to_string());
        let out = lobby.join(record)?;
        self.sessions
            .write()
            .await
            .insert(player_id.to_string(), code.clone());

        tracing::info!("{} joined lobby {} ({} players)", player_id, code, lobby.len());
        self.flush(&lobby, out);
        Ok(ServerMessage::LobbyJoined {
            lobby: lobby.snapshot(),
        })
    }

    /// Re-attach a seated player's new socket. Returns their full state, or
    /// None if they hold no seat.
    pub async fn reconnect(&self, player_id: &str, connection: &str) -> Option<ServerMessage> {
        let handle = self.lobby_of(player_id).await.ok()?;
        let mut lobby = handle.lock().await;
        if !lobby.attach(player_id, connection.to_string()) {
            return None;
        }

        tracing::info!("{} reattached to lobby {}", player_id, lobby.code);
        let mut out = Outbox::new();
        lobby.broadcast_presence(&mut out);
        self.flush(&lobby, out);
        Some(lobby.state_for(player_id))
    }

    /// Leave voluntarily. Mid-game the seat stays and is only detached.
    pub async fn leave_lobby(&self, player_id: &str) -> GameResult<ServerMessage> {
        let handle = self.lobby_of(player_id).await?;
        let mut lobby = handle.lock().await;

        let out = if lobby.has_active_game() {
            lobby.detach(player_id, None);
            let mut out = Outbox::new();
            lobby.broadcast_presence(&mut out);
            out
        } else {
            lobby.leave(player_id)?
        };
        self.sessions.write().await.remove(player_id);
        tracing::info!("{} left lobby {}", player_id, lobby.code);

        self.flush(&lobby, out);
        self.settle(&handle, lobby).await;

        Ok(ServerMessage::LobbyLeft)
    }

    /// Socket closed. Ignored if the player has since attached a newer
    /// socket. Outside a running game this is a leave.
    pub async fn disconnect(&self, player_id: &str, connection: &str) {
        let Ok(handle) = self.lobby_of(player_id).await else {
            return;
        };
        let mut lobby = handle.lock().await;

        let current = lobby
            .players
            .get(player_id)
            .and_then(|p| p.connection.as_deref());
        if current != Some(connection) {
            return;
        }

        let out = if lobby.has_active_game() {
            lobby.detach(player_id, Some(connection));
            tracing::info!("{} disconnected from lobby {} mid-game", player_id, lobby.code);
            let mut out = Outbox::new();
            lobby.broadcast_presence(&mut out);
            out
        } else {
            match lobby.leave(player_id) {
                Ok(out) => {
                    self.sessions.write().await.remove(player_id);
                    tracing::info!("{} disconnected and left lobby {}", player_id, lobby.code);
                    out
                }
                Err(e) => {
                    tracing::warn!("Disconnect of {} failed: {}", player_id, e);
                    return;
                }
            }
        };

        self.flush(&lobby, out);
        self.settle(&handle, lobby).await;
    }

    pub async fn start_game(&self, player_id: &str) -> GameResult<()> {
        self.mutate(player_id, |lobby| lobby.start_game(player_id, &mut rand::rng()))
            .await
    }

    pub async fn update_settings(&self, player_id: &str, patch: &Map<String, Value>) -> GameResult<()> {
        self.mutate(player_id, |lobby| lobby.update_settings(patch, player_id))
            .await
    }

    pub async fn send_chat(&self, player_id: &str, text: &str) -> GameResult<()> {
        self.mutate(player_id, |lobby| lobby.chat(player_id, text)).await
    }

    pub async fn submit_night_action(&self, player_id: &str, target_id: &str) -> GameResult<()> {
        self.mutate(player_id, |lobby| lobby.submit_night_action(player_id, target_id))
            .await
    }

    pub async fn cast_vote(&self, player_id: &str, target_id: &str) -> GameResult<()> {
        self.mutate(player_id, |lobby| lobby.cast_vote(player_id, target_id))
            .await
    }

    /// Personalised full state for a resync
    pub async fn state_for(&self, player_id: &str) -> GameResult<ServerMessage> {
        let handle = self.lobby_of(player_id).await?;
        let lobby = handle.lock().await;
        Ok(lobby.state_for(player_id))
    }

    pub async fn lobby_snapshot(&self, code: &str) -> Option<LobbySnapshot> {
        let handle = self.get_lobby(&normalize_code(code)).await?;
        let lobby = handle.lock().await;
        Some(lobby.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Envelope;
    use crate::types::GamePhase;
    use tokio::sync::broadcast::Receiver;

    fn code_of(msg: &ServerMessage) -> String {
        match msg {
            ServerMessage::LobbyJoined { lobby } => lobby.code.clone(),
            other => panic!("Expected LobbyJoined, got {:?}", other),
        }
    }

    fn drain(rx: &mut Receiver<Envelope>) -> Vec<Envelope> {
        let mut got = Vec::new();
        while let Ok(env) = rx.try_recv() {
            got.push(env);
        }
        got
    }

    async fn lobby_with(state: &AppState, n: usize) -> String {
        let code = code_of(&state.create_lobby("p0", "c0", "Player 0").await.unwrap());
        for i in 1..n {
            state
                .join_lobby(&format!("p{}", i), &format!("c{}", i), &format!("Player {}", i), &code)
                .await
                .unwrap();
        }
        code
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let state = AppState::new();
        let code = lobby_with(&state, 3).await;

        let snapshot = state.lobby_snapshot(&code.to_lowercase()).await.unwrap();
        assert_eq!(snapshot.player_count, 3);
        assert!(snapshot.players[0].is_admin);
        assert!(snapshot.players.iter().all(|p| p.connected && p.role.is_none()));
        assert_eq!(state.session_of("p2").await, Some(code));
    }

    #[tokio::test]
    async fn test_join_unknown_lobby() {
        let state = AppState::new();
        let result = state.join_lobby("p1", "c1", "Alice", "ZZZZZZ").await;
        assert!(matches!(result, Err(GameError::Validation(_))));
        assert!(state.session_of("p1").await.is_none());
    }

    #[tokio::test]
    async fn test_one_lobby_per_player() {
        let state = AppState::new();
        let first = lobby_with(&state, 1).await;
        let second = code_of(&state.create_lobby("q0", "cq", "Quinn").await.unwrap());
        assert_ne!(first, second);

        assert!(matches!(
            state.join_lobby("p0", "c0", "Player 0", &second).await,
            Err(GameError::Validation(_))
        ));
        assert!(matches!(
            state.create_lobby("p0", "c0", "Player 0").await,
            Err(GameError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_last_leave_discards_lobby() {
        let state = AppState::new();
        let code = lobby_with(&state, 2).await;

        state.leave_lobby("p0").await.unwrap();
        assert_eq!(state.lobby_count().await, 1);
        let snapshot = state.lobby_snapshot(&code).await.unwrap();
        assert!(snapshot.players[0].is_admin);

        let reply = state.leave_lobby("p1").await.unwrap();
        assert!(matches!(reply, ServerMessage::LobbyLeft));
        assert_eq!(state.lobby_count().await, 0);
        assert!(state.lobby_snapshot(&code).await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_pregame_leaves() {
        let state = AppState::new();
        let code = lobby_with(&state, 2).await;

        // Stale connection id is ignored
        state.disconnect("p1", "old-socket").await;
        assert_eq!(state.lobby_snapshot(&code).await.unwrap().player_count, 2);

        state.disconnect("p1", "c1").await;
        assert_eq!(state.lobby_snapshot(&code).await.unwrap().player_count, 1);
        assert!(state.session_of("p1").await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_mid_game_keeps_seat_and_reconnects() {
        let state = AppState::new();
        let code = lobby_with(&state, 4).await;
        state.start_game("p0").await.unwrap();

        state.disconnect("p2", "c2").await;
        let snapshot = state.lobby_snapshot(&code).await.unwrap();
        assert_eq!(snapshot.player_count, 4);
        assert!(!snapshot.players[2].connected);

        let reply = state.join_lobby("p2", "c2b", "Player 2", &code).await.unwrap();
        match reply {
            ServerMessage::State { game, your_role, .. } => {
                assert!(your_role.is_some());
                let game = game.unwrap();
                assert_eq!(game.phase, GamePhase::Night);
                assert_eq!(game.players["p2"].role, your_role);
            }
            other => panic!("Expected State, got {:?}", other),
        }
        assert!(state.lobby_snapshot(&code).await.unwrap().players[2].connected);
    }

    #[tokio::test]
    async fn test_leave_mid_game_detaches() {
        let state = AppState::new();
        let code = lobby_with(&state, 4).await;
        state.start_game("p0").await.unwrap();

        state.leave_lobby("p3").await.unwrap();
        let snapshot = state.lobby_snapshot(&code).await.unwrap();
        assert_eq!(snapshot.player_count, 4);
        assert!(!snapshot.players[3].connected);
        assert!(state.session_of("p3").await.is_none());
    }

    #[tokio::test]
    async fn test_everyone_leaving_mid_game_discards_lobby() {
        let state = AppState::new();
        let code = lobby_with(&state, 4).await;
        state.start_game("p0").await.unwrap();

        for i in 0..3 {
            state.leave_lobby(&format!("p{}", i)).await.unwrap();
            assert_eq!(state.lobby_count().await, 1);
        }
        state.leave_lobby("p3").await.unwrap();
        assert_eq!(state.lobby_count().await, 0);

        // The code is free again and a fresh join is a plain miss
        assert!(matches!(
            state.join_lobby("p0", "c0b", "Player 0", &code).await,
            Err(GameError::Validation(_))
        ));
        assert!(state.session_of("p0").await.is_none());
    }

    #[tokio::test]
    async fn test_mid_game_disconnects_keep_lobby_for_reconnect() {
        let state = AppState::new();
        let code = lobby_with(&state, 4).await;
        state.start_game("p0").await.unwrap();

        state.leave_lobby("p0").await.unwrap();
        for _ in 0..20 {
            state.tick_all().await;
        }
        for i in 1..4 {
            state.disconnect(&format!("p{}", i), &format!("c{}", i)).await;
        }

        // Sessions survive a disconnect, so the seats can still be reclaimed
        assert_eq!(state.lobby_count().await, 1);
        let reply = state.reconnect("p2", "c2b").await;
        assert!(matches!(reply, Some(ServerMessage::State { .. })));

        // Once p2 walks away too, nobody can come back to it through a leave
        state.leave_lobby("p2").await.unwrap();
        state.leave_lobby("p1").await.unwrap();
        assert_eq!(state.lobby_count().await, 1);
        state.leave_lobby("p3").await.unwrap();
        assert_eq!(state.lobby_count().await, 0);
        assert!(state.lobby_snapshot(&code).await.is_none());
    }

    #[tokio::test]
    async fn test_game_end_prunes_seats_that_left() {
        let state = AppState::new();
        let code = lobby_with(&state, 4).await;
        state.start_game("p0").await.unwrap();
        state.leave_lobby("p3").await.unwrap();

        let handle = state.get_lobby(&code).await.unwrap();
        {
            let mut lobby = handle.lock().await;
            let game = lobby.game.as_mut().unwrap();
            game.phase = GamePhase::Ended;
            game.winner = Some(crate::types::Winner::Town);
        }
        state.tick_all().await;

        let snapshot = state.lobby_snapshot(&code).await.unwrap();
        assert_eq!(snapshot.player_count, 3);
        assert!(snapshot.players.iter().all(|p| p.id != "p3"));

        // Everyone else leaves normally now the game is over
        for i in 0..3 {
            state.leave_lobby(&format!("p{}", i)).await.unwrap();
        }
        assert_eq!(state.lobby_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_delivers_private_roles() {
        let state = AppState::new();
        let mut rx = state.outbound.subscribe();
        lobby_with(&state, 5).await;
        drain(&mut rx);

        state.start_game("p0").await.unwrap();
        let envelopes = drain(&mut rx);

        for i in 0..5 {
            let id = format!("p{}", i);
            let private_roles = envelopes
                .iter()
                .filter(|e| e.recipients == vec![id.clone()])
                .filter(|e| matches!(e.message, ServerMessage::RoleAssigned { .. }))
                .count();
            assert_eq!(private_roles, 1, "{}", id);
        }
        assert!(envelopes
            .iter()
            .filter(|e| matches!(e.message, ServerMessage::RoleAssigned { .. }))
            .all(|e| e.recipients.len() == 1));
    }

    #[tokio::test]
    async fn test_commands_require_a_seat() {
        let state = AppState::new();
        assert!(matches!(state.start_game("nobody").await, Err(GameError::Validation(_))));
        assert!(matches!(state.send_chat("nobody", "hi").await, Err(GameError::Validation(_))));
        assert!(matches!(state.state_for("nobody").await, Err(GameError::Validation(_))));
        assert!(matches!(state.leave_lobby("nobody").await, Err(GameError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_settings_through_registry() {
        let state = AppState::new();
        let code = lobby_with(&state, 2).await;
        let patch = serde_json::json!({"phase_seconds": 30, "detective": true});
        let patch = patch.as_object().unwrap();

        assert!(matches!(
            state.update_settings("p1", patch).await,
            Err(GameError::Authorization(_))
        ));
        state.update_settings("p0", patch).await.unwrap();

        let settings = state.lobby_snapshot(&code).await.unwrap().settings;
        assert_eq!(settings.phase_seconds, 30);
        assert!(settings.detective);
    }
}
