//! Event delivery
//!
//! Game logic never talks to sockets. It writes [`Delivery`] records into an
//! [`Outbox`]; the [`AppState`] resolves each target against the lobby's
//! attached members and publishes an [`Envelope`] on the broadcast channel.
//! Every socket forwards the envelopes that name its player.

use crate::protocol::ServerMessage;
use crate::state::{AppState, Lobby};
use crate::types::PlayerId;

/// Who should receive a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every attached member of the lobby
    Room,
    /// One member of the lobby
    Player(PlayerId),
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub target: Target,
    pub message: ServerMessage,
}

/// Messages produced by one state mutation, in emission order
#[derive(Debug, Default)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&mut self, message: ServerMessage) {
        self.deliveries.push(Delivery {
            target: Target::Room,
            message,
        });
    }

    pub fn player(&mut self, player_id: &str, message: ServerMessage) {
        self.deliveries.push(Delivery {
            target: Target::Player(player_id.to_string()),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Messages addressed to one player (excluding room-wide ones)
    pub fn private_to<'a>(&'a self, player_id: &'a str) -> impl Iterator<Item = &'a ServerMessage> {
        self.deliveries.iter().filter_map(move |d| match &d.target {
            Target::Player(id) if id == player_id => Some(&d.message),
            _ => None,
        })
    }

    /// Room-wide messages
    pub fn to_room(&self) -> impl Iterator<Item = &ServerMessage> {
        self.deliveries
            .iter()
            .filter(|d| d.target == Target::Room)
            .map(|d| &d.message)
    }
}

impl IntoIterator for Outbox {
    type Item = Delivery;
    type IntoIter = std::vec::IntoIter<Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.deliveries.into_iter()
    }
}

/// A message with its resolved recipients, as carried on the broadcast channel
#[derive(Debug, Clone)]
pub struct Envelope {
    pub recipients: Vec<PlayerId>,
    pub message: ServerMessage,
}

impl Envelope {
    pub fn is_for(&self, player_id: &str) -> bool {
        self.recipients.iter().any(|id| id == player_id)
    }
}

impl AppState {
    /// Publish a lobby's outbox. Call while still holding the lobby lock so
    /// recipients match the state the messages describe.
    pub fn flush(&self, lobby: &Lobby, outbox: Outbox) {
        for delivery in outbox {
            let recipients = match delivery.target {
                Target::Room => lobby.attached_ids(),
                Target::Player(id) => {
                    if lobby.is_attached(&id) {
                        vec![id]
                    } else {
                        Vec::new()
                    }
                }
            };

            if recipients.is_empty() {
                continue;
            }

            // No receivers connected is fine
            let _ = self.outbound.send(Envelope {
                recipients,
                message: delivery.message,
            });
        }
    }
}
