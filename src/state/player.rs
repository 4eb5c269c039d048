use crate::error::{GameError, GameResult};
use crate::types::*;
use indexmap::IndexMap;
use rand::Rng;

/// Safe character set for short codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 24;

/// Lobby members in join order. Order decides admin failover.
pub type Players = IndexMap<PlayerId, PlayerRecord>;

/// Generate a random short lobby code
pub fn generate_lobby_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Normalise a code typed by a player
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Trim and length-check a display name
pub fn validate_name(name: &str) -> GameResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if len < MIN_NAME_CHARS {
        return Err(GameError::validation(format!(
            "Name must be at least {} characters",
            MIN_NAME_CHARS
        )));
    }
    if len > MAX_NAME_CHARS {
        return Err(GameError::validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    /// Current socket, None while disconnected
    pub connection: Option<ConnectionId>,
    /// None until the game assigns roles
    pub role: Option<Role>,
    pub alive: bool,
    pub vote_target: Option<PlayerId>,
    pub is_admin: bool,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            connection: None,
            role: None,
            alive: true,
            vote_target: None,
            is_admin: false,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn is_mafia(&self) -> bool {
        self.role == Some(Role::Mafia)
    }

    /// Alive with a role that acts at night
    pub fn acts_at_night(&self) -> bool {
        self.alive && self.role.and_then(Role::night_action).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_lobby_code() {
        let code = generate_lobby_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  ab3def \n"), "AB3DEF");
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Alice ").unwrap(), "Alice");
        assert!(matches!(validate_name(" A "), Err(GameError::Validation(_))));
        assert!(matches!(validate_name(""), Err(GameError::Validation(_))));
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn test_acts_at_night() {
        let mut p = PlayerRecord::new("p1".to_string(), "Alice".to_string());
        assert!(!p.acts_at_night());

        p.role = Some(Role::Townsfolk);
        assert!(!p.acts_at_night());

        p.role = Some(Role::Doctor);
        assert!(p.acts_at_night());

        p.alive = false;
        assert!(!p.acts_at_night());
    }
}
