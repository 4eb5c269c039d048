//! Lobby membership, settings and chat
//!
//! A lobby owns its players; once started, the game works on that same map.

use super::chat::ChatLog;
use super::game::Game;
use super::player::{PlayerRecord, Players};
use crate::broadcast::Outbox;
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::Rng;
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct Lobby {
    pub code: LobbyCode,
    pub players: Players,
    pub settings: LobbySettings,
    /// None until the admin starts the game
    pub game: Option<Game>,
    pub messages: ChatLog,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Set when the last member leaves; the registry drops closed lobbies
    closed: bool,
}

/// Merge recognised keys from a client patch. Unknown keys are ignored;
/// a recognised key with a bad value rejects the whole patch.
pub fn merge_settings(current: &LobbySettings, patch: &Map<String, Value>) -> GameResult<LobbySettings> {
    let mut merged = current.clone();

    for (key, value) in patch {
        match key.as_str() {
            "doctor" => merged.doctor = bool_setting(key, value)?,
            "detective" => merged.detective = bool_setting(key, value)?,
            "night_chat" => merged.night_chat = bool_setting(key, value)?,
            "min_players" => merged.min_players = count_setting(key, value)?,
            "max_players" => merged.max_players = count_setting(key, value)?,
            "phase_seconds" => {
                merged.phase_seconds = u32::try_from(count_setting(key, value)?)
                    .map_err(|_| GameError::validation("phase_seconds is too large"))?
            }
            _ => tracing::debug!("Ignoring unknown setting: {}", key),
        }
    }

    if merged.max_players == 0 {
        return Err(GameError::validation("max_players must be at least 1"));
    }
    if merged.phase_seconds == 0 {
        return Err(GameError::validation("phase_seconds must be at least 1"));
    }
    if merged.min_players > merged.max_players {
        merged.min_players = merged.max_players;
    }

    Ok(merged)
}

fn bool_setting(key: &str, value: &Value) -> GameResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| GameError::validation(format!("{} must be a boolean", key)))
}

fn count_setting(key: &str, value: &Value) -> GameResult<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| GameError::validation(format!("{} must be a non-negative integer", key)))
}

impl Lobby {
    /// New lobby with the creator as sole admin
    pub fn new(code: LobbyCode, mut creator: PlayerRecord, settings: LobbySettings) -> Self {
        creator.is_admin = true;
        let mut players = Players::new();
        players.insert(creator.id.clone(), creator);

        Self {
            code,
            players,
            settings,
            game: None,
            messages: ChatLog::default(),
            created_at: chrono::Utc::now(),
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn admin_id(&self) -> Option<&PlayerId> {
        self.players.values().find(|p| p.is_admin).map(|p| &p.id)
    }

    pub fn is_admin(&self, player_id: &str) -> bool {
        self.players.get(player_id).is_some_and(|p| p.is_admin)
    }

    /// A game exists and has not ended
    pub fn has_active_game(&self) -> bool {
        self.game.as_ref().is_some_and(|g| !g.is_ended())
    }

    /// Members with a live connection, in join order
    pub fn attached_ids(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.connection.is_some())
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn is_attached(&self, player_id: &str) -> bool {
        self.players
            .get(player_id)
            .is_some_and(|p| p.connection.is_some())
    }

    pub fn attach(&mut self, player_id: &str, connection: ConnectionId) -> bool {
        match self.players.get_mut(player_id) {
            Some(p) => {
                p.connection = Some(connection);
                true
            }
            None => false,
        }
    }

    /// Drop the player's connection. With `only_if`, only when it still
    /// matches (a newer socket may have taken over the seat).
    pub fn detach(&mut self, player_id: &str, only_if: Option<&str>) -> bool {
        match self.players.get_mut(player_id) {
            Some(p) if only_if.is_none() || p.connection.as_deref() == only_if => {
                p.connection = None;
                true
            }
            _ => false,
        }
    }

    /// Append to the lobby chat and return the entry for broadcasting
    pub fn add_message(&mut self, text: impl Into<String>, author: Option<&str>) -> ChatEntry {
        self.messages.push(text, author)
    }

    fn announce(&mut self, text: String, out: &mut Outbox) {
        let entry = self.add_message(text, None);
        out.room(ServerMessage::NewMessage { entry });
    }

    pub fn broadcast_lobby(&self, out: &mut Outbox) {
        out.room(ServerMessage::LobbyUpdate {
            lobby: self.snapshot(),
        });
    }

    /// Tell the room someone's connection changed
    pub fn broadcast_presence(&self, out: &mut Outbox) {
        self.broadcast_lobby(out);
        if let Some(game) = &self.game {
            game.broadcast_state(&self.players, out);
        }
    }

    pub fn join(&mut self, mut player: PlayerRecord) -> GameResult<Outbox> {
        if self.closed {
            return Err(GameError::validation("Lobby not found"));
        }
        if self.has_active_game() {
            return Err(GameError::capacity("Game already in progress"));
        }
        if self.game.is_some() {
            return Err(GameError::capacity("Game has finished"));
        }
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::capacity("Lobby is full"));
        }
        if self.players.contains_key(&player.id) {
            return Err(GameError::validation("Already in this lobby"));
        }

        player.is_admin = false;
        let name = player.name.clone();
        self.players.insert(player.id.clone(), player);

        let mut out = Outbox::new();
        self.announce(format!("{} joined the lobby", name), &mut out);
        self.broadcast_lobby(&mut out);
        Ok(out)
    }

    /// Remove a member. Admin passes to the earliest-joined remaining
    /// member; an emptied lobby is closed.
    pub fn leave(&mut self, player_id: &str) -> GameResult<Outbox> {
        if self.has_active_game() {
            return Err(GameError::authorization("Cannot leave a game in progress"));
        }
        let removed = self
            .players
            .shift_remove(player_id)
            .ok_or_else(|| GameError::validation("Not in this lobby"))?;

        let mut out = Outbox::new();
        if self.players.is_empty() {
            self.closed = true;
            return Ok(out);
        }

        if removed.is_admin {
            self.pass_admin();
        }

        self.announce(format!("{} left the lobby", removed.name), &mut out);
        self.broadcast_lobby(&mut out);
        Ok(out)
    }

    fn pass_admin(&mut self) {
        if let Some(next) = self.players.values_mut().next() {
            next.is_admin = true;
            tracing::info!("Lobby {}: admin passed to {}", self.code, next.id);
        }
    }

    /// Clean up after members who walked away from a game. `held` says
    /// whether a player's session still points at this lobby.
    ///
    /// A running game nobody is attached to and nobody can reattach to is
    /// abandoned and the lobby closes. Once the game has ended, seats that
    /// are detached and unheld are removed.
    pub fn reap_departed(&mut self, held: impl Fn(&str) -> bool) -> Outbox {
        let mut out = Outbox::new();
        let gone = |p: &PlayerRecord| p.connection.is_none() && !held(&p.id);

        if self.has_active_game() {
            if self.players.values().all(gone) {
                tracing::info!("Lobby {}: game abandoned", self.code);
                self.closed = true;
            }
            return out;
        }
        if self.game.is_none() {
            return out;
        }

        let before = self.players.len();
        let admin_gone = self.players.values().any(|p| p.is_admin && gone(p));
        self.players.retain(|_, p| !gone(p));
        if self.players.len() == before {
            return out;
        }

        tracing::info!(
            "Lobby {}: pruned {} departed seats",
            self.code,
            before - self.players.len()
        );
        if self.players.is_empty() {
            self.closed = true;
            return out;
        }
        if admin_gone {
            self.pass_admin();
        }
        self.broadcast_lobby(&mut out);
        out
    }

    pub fn update_settings(&mut self, patch: &Map<String, Value>, requester: &str) -> GameResult<Outbox> {
        if self.game.is_some() {
            return Err(GameError::authorization(
                "Settings cannot change once the game has started",
            ));
        }
        if !self.is_admin(requester) {
            return Err(GameError::authorization("Only the admin can change settings"));
        }

        self.settings = merge_settings(&self.settings, patch)?;
        tracing::info!("Lobby {}: settings updated {:?}", self.code, self.settings);

        let mut out = Outbox::new();
        self.broadcast_lobby(&mut out);
        Ok(out)
    }

    pub fn start_game<R: Rng + ?Sized>(&mut self, requester: &str, rng: &mut R) -> GameResult<Outbox> {
        if self.game.is_some() {
            return Err(GameError::capacity("Game already in progress"));
        }
        if !self.is_admin(requester) {
            return Err(GameError::authorization("Only the admin can start the game"));
        }
        if self.players.len() < self.settings.min_players {
            return Err(GameError::capacity(format!(
                "Need at least {} players to start",
                self.settings.min_players
            )));
        }

        tracing::info!(
            "Lobby {}: starting game with {} players",
            self.code,
            self.players.len()
        );

        let mut out = Outbox::new();
        out.room(ServerMessage::GameStarted {
            code: self.code.clone(),
        });
        let game = Game::start(&mut self.players, &self.settings, rng, &mut out);
        self.game = Some(game);
        self.broadcast_lobby(&mut out);
        Ok(out)
    }

    /// Lobby chat before the game; game communications during it. At night
    /// only living mafia may talk (if allowed), and only they hear it.
    pub fn chat(&mut self, player_id: &str, text: &str) -> GameResult<Outbox> {
        let text = text.trim();
        if text.is_empty() {
            return Err(GameError::validation("Message cannot be empty"));
        }
        let (name, is_mafia) = match self.players.get(player_id) {
            Some(p) => (p.name.clone(), p.alive && p.is_mafia()),
            None => return Err(GameError::validation("Not in this lobby")),
        };

        let mut out = Outbox::new();
        match self.game.as_mut() {
            None => {
                let entry = self.messages.push(text, Some(&name));
                out.room(ServerMessage::NewMessage { entry });
            }
            Some(game) if game.phase == GamePhase::Night => {
                if !(is_mafia && self.settings.night_chat) {
                    return Err(GameError::authorization("Only the mafia may speak at night"));
                }
                let entry = ChatEntry::new(text, Some(&name));
                for p in self.players.values().filter(|p| p.alive && p.is_mafia()) {
                    out.player(
                        &p.id,
                        ServerMessage::MafiaChat {
                            entry: entry.clone(),
                        },
                    );
                }
            }
            Some(game) => {
                let entry = game.communications.push(text, Some(&name));
                out.room(ServerMessage::NewMessage { entry });
            }
        }
        Ok(out)
    }

    /// Record a night action; the actor gets a private confirmation
    pub fn submit_night_action(&mut self, actor_id: &str, target_id: &str) -> GameResult<Outbox> {
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| GameError::authorization("No game in progress"))?;
        let action = game.submit_night_action(actor_id, target_id, &self.players)?;

        let mut out = Outbox::new();
        out.player(
            actor_id,
            ServerMessage::ActionConfirmed {
                action: action.kind,
                target_id: action.target_id,
            },
        );
        Ok(out)
    }

    pub fn cast_vote(&mut self, voter_id: &str, target_id: &str) -> GameResult<Outbox> {
        let game = self
            .game
            .as_mut()
            .ok_or_else(|| GameError::authorization("No game in progress"))?;
        let mut out = Outbox::new();
        out.player(
            voter_id,
            ServerMessage::VoteConfirmed {
                target_id: target_id.to_string(),
            },
        );
        game.cast_vote(voter_id, target_id, &mut self.players, &mut out)?;
        Ok(out)
    }

    /// One timer unit for this lobby's game, if it is running
    pub fn tick(&mut self) -> Outbox {
        let mut out = Outbox::new();
        if let Some(game) = self.game.as_mut() {
            game.tick(&mut self.players, &self.settings, &mut out);
        }
        out
    }
}
