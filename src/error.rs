use crate::protocol::ServerMessage;

pub type GameResult<T> = Result<T, GameError>;

/// Errors surfaced to the requesting player. None of them change state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Bad name, unknown lobby code, malformed payload
    #[error("{0}")]
    Validation(String),

    /// Not admin, dead, or wrong phase for the action
    #[error("{0}")]
    Authorization(String),

    /// Lobby full, game in progress, not enough players
    #[error("{0}")]
    Capacity(String),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "VALIDATION_ERROR",
            GameError::Authorization(_) => "AUTHORIZATION_ERROR",
            GameError::Capacity(_) => "CAPACITY_ERROR",
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(e: GameError) -> Self {
        ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        }
    }
}
