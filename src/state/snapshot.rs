//! Client-facing views of lobby and game state
//!
//! Living players' roles stay hidden from broadcasts. The dead are revealed
//! as they fall and everyone is revealed once the game has ended. A
//! personalised view additionally shows the viewer their own role and, to a
//! mafia viewer, the rest of the mafia.

use super::game::Game;
use super::lobby::Lobby;
use super::player::{PlayerRecord, Players};
use super::vote::tally;
use crate::protocol::{GameSnapshot, LobbySnapshot, PlayerView, ServerMessage};
use crate::types::*;
use std::collections::HashMap;

fn view(p: &PlayerRecord, role: Option<Role>, votes: u32) -> PlayerView {
    PlayerView {
        id: p.id.clone(),
        name: p.name.clone(),
        role,
        alive: p.alive,
        votes,
        is_admin: p.is_admin,
        connected: p.connection.is_some(),
    }
}

impl Game {
    /// Public snapshot, as broadcast to the whole lobby
    pub fn snapshot(&self, players: &Players) -> GameSnapshot {
        self.build_snapshot(players, None)
    }

    /// Snapshot as seen by one player
    pub fn snapshot_for(&self, players: &Players, viewer_id: &str) -> GameSnapshot {
        self.build_snapshot(players, players.get(viewer_id))
    }

    fn build_snapshot(&self, players: &Players, viewer: Option<&PlayerRecord>) -> GameSnapshot {
        let counts: HashMap<PlayerId, u32> = tally(&self.votes);

        let views = players
            .values()
            .map(|p| {
                let role = if self.role_visible(p, viewer) { p.role } else { None };
                let votes = counts.get(&p.id).copied().unwrap_or(0);
                (p.id.clone(), view(p, role, votes))
            })
            .collect();

        GameSnapshot {
            phase: self.phase,
            day_number: self.day_number,
            time_remaining: self.time_remaining,
            players: views,
            communications: self.communications.to_vec(),
            winner: self.winner,
            started_at: self.started_at.to_rfc3339(),
        }
    }

    fn role_visible(&self, subject: &PlayerRecord, viewer: Option<&PlayerRecord>) -> bool {
        if self.is_ended() || !subject.alive {
            return true;
        }
        match viewer {
            Some(v) if v.id == subject.id => true,
            Some(v) => v.is_mafia() && subject.is_mafia(),
            None => false,
        }
    }
}

impl Lobby {
    /// Membership view. Once a game runs it carries the same public roles
    /// and vote counts as the broadcast game snapshot.
    pub fn snapshot(&self) -> LobbySnapshot {
        let players = match &self.game {
            None => self.players.values().map(|p| view(p, None, 0)).collect(),
            Some(game) => {
                let counts = tally(&game.votes);
                self.players
                    .values()
                    .map(|p| {
                        let role = if game.role_visible(p, None) { p.role } else { None };
                        view(p, role, counts.get(&p.id).copied().unwrap_or(0))
                    })
                    .collect()
            }
        };

        LobbySnapshot {
            code: self.code.clone(),
            players,
            player_count: self.players.len(),
            settings: self.settings.clone(),
            game_started: self.game.is_some(),
            messages: self.messages.to_vec(),
            created_at: self.created_at.to_rfc3339(),
        }
    }

    /// Full personalised state, the reply to a resync request
    pub fn state_for(&self, viewer_id: &str) -> ServerMessage {
        let your_role = self.players.get(viewer_id).and_then(|p| p.role);
        ServerMessage::State {
            lobby: self.snapshot(),
            game: self
                .game
                .as_ref()
                .map(|g| g.snapshot_for(&self.players, viewer_id)),
            your_role,
        }
    }
}
