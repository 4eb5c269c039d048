use crate::types::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateLobby {
        name: String,
    },
    JoinLobby {
        name: String,
        code: String,
    },
    LeaveLobby,
    /// Admin only, pre-game
    StartGame,
    /// Admin only, pre-game. Unknown keys are ignored.
    UpdateSettings {
        settings: serde_json::Map<String, serde_json::Value>,
    },
    SendMessage {
        text: String,
    },
    NightAction {
        target_id: PlayerId,
    },
    CastVote {
        target_id: PlayerId,
    },
    /// Ask for a full personalised snapshot (resync after reconnect or lag)
    RequestState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        player_id: PlayerId,
        server_now: String,
    },
    /// Reply to create/join
    LobbyJoined {
        lobby: LobbySnapshot,
    },
    LobbyUpdate {
        lobby: LobbySnapshot,
    },
    LobbyLeft,
    NewMessage {
        entry: ChatEntry,
    },
    /// Night chat, delivered to living mafia only
    MafiaChat {
        entry: ChatEntry,
    },
    GameStarted {
        code: LobbyCode,
    },
    GameUpdate {
        game: GameSnapshot,
    },
    /// Private: the recipient's own role
    RoleAssigned {
        role: Role,
    },
    /// Private: names of the other living mafia members
    MafiaTeam {
        teammates: Vec<String>,
    },
    /// Private: result of the detective's investigation
    InvestigationResult {
        target_id: PlayerId,
        target_name: String,
        verdict: Verdict,
    },
    ActionConfirmed {
        action: NightActionKind,
        target_id: PlayerId,
    },
    VoteConfirmed {
        target_id: PlayerId,
    },
    /// Personalised full snapshot
    State {
        lobby: LobbySnapshot,
        game: Option<GameSnapshot>,
        your_role: Option<Role>,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Public view of one player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    /// Absent pre-game and for living players whose role is still secret
    pub role: Option<Role>,
    pub alive: bool,
    /// Votes currently cast against this player
    pub votes: u32,
    pub is_admin: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LobbySnapshot {
    pub code: LobbyCode,
    pub players: Vec<PlayerView>,
    pub player_count: usize,
    pub settings: LobbySettings,
    pub game_started: bool,
    pub messages: Vec<ChatEntry>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameSnapshot {
    pub phase: GamePhase,
    pub day_number: u32,
    pub time_remaining: u32,
    pub players: IndexMap<PlayerId, PlayerView>,
    pub communications: Vec<ChatEntry>,
    pub winner: Option<Winner>,
    pub started_at: String,
}
