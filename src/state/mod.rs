mod chat;
mod commands;
pub mod game;
mod lobby;
pub mod night;
mod player;
mod roles;
mod snapshot;
pub mod vote;

pub use chat::{ChatLog, CHAT_LOG_CAPACITY};
pub use game::{check_winner, Game};
pub use lobby::{merge_settings, Lobby};
pub use player::{generate_lobby_code, normalize_code, validate_name, PlayerRecord, Players};
pub use roles::{assign_roles, mafia_count};

use crate::broadcast::Envelope;
use crate::config::ServerConfig;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

pub type SharedLobby = Arc<Mutex<Lobby>>;

/// Shared application state
///
/// Lock order: a lobby's mutex before `sessions`. The `lobbies` map is
/// never locked while a lobby mutex is held.
#[derive(Clone)]
pub struct AppState {
    pub lobbies: Arc<RwLock<HashMap<LobbyCode, SharedLobby>>>,
    /// Which lobby each seated player belongs to
    pub sessions: Arc<RwLock<HashMap<PlayerId, LobbyCode>>>,
    /// Resolved deliveries for every socket
    pub outbound: broadcast::Sender<Envelope>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let (tx, _rx) = broadcast::channel(config.event_buffer);
        Self {
            lobbies: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            outbound: tx,
            config: Arc::new(config),
        }
    }

    pub async fn get_lobby(&self, code: &str) -> Option<SharedLobby> {
        self.lobbies.read().await.get(code).cloned()
    }

    /// The lobby code a player is seated in, if any
    pub async fn session_of(&self, player_id: &str) -> Option<LobbyCode> {
        self.sessions.read().await.get(player_id).cloned()
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
