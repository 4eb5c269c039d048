use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type PlayerId = String;
pub type LobbyCode = String;
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Setup,
    Night,
    Day,
    Discussion,
    Voting,
    Ended,
}

impl GamePhase {
    /// Phases the timer counts down
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            GamePhase::Night | GamePhase::Day | GamePhase::Discussion | GamePhase::Voting
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mafia,
    Doctor,
    Detective,
    Townsfolk,
}

impl Role {
    /// The night action this role may submit, if any
    pub fn night_action(self) -> Option<NightActionKind> {
        match self {
            Role::Mafia => Some(NightActionKind::MafiaKill),
            Role::Doctor => Some(NightActionKind::DoctorHeal),
            Role::Detective => Some(NightActionKind::DetectiveInvestigate),
            Role::Townsfolk => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NightActionKind {
    MafiaKill,
    DoctorHeal,
    DetectiveInvestigate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NightAction {
    pub kind: NightActionKind,
    pub target_id: PlayerId,
}

/// What the detective learns about a target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Suspicious,
    Trustworthy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Town,
    Mafia,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LobbySettings {
    pub doctor: bool,
    pub detective: bool,
    pub min_players: usize,
    pub max_players: usize,
    /// Seconds for night and day; discussion and voting get half
    pub phase_seconds: u32,
    /// Whether mafia may talk to each other at night
    pub night_chat: bool,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            doctor: true,
            detective: false,
            min_players: 4,
            max_players: 12,
            phase_seconds: 120,
            night_chat: false,
        }
    }
}

impl LobbySettings {
    pub fn full_phase_seconds(&self) -> u32 {
        self.phase_seconds.max(1)
    }

    pub fn half_phase_seconds(&self) -> u32 {
        (self.phase_seconds / 2).max(1)
    }
}

/// A single line in a lobby chat or game communications log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatEntry {
    pub timestamp: String,
    /// None for system announcements
    pub author: Option<String>,
    pub text: String,
}

impl ChatEntry {
    pub fn new(text: impl Into<String>, author: Option<&str>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            author: author.map(str::to_string),
            text: text.into(),
        }
    }
}
