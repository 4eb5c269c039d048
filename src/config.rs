//! Server configuration from environment variables

use crate::types::LobbySettings;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5000);
const DEFAULT_TICK_MS: u64 = 1000;
const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Length of one timer unit
    pub tick_interval: Duration,
    /// Settings every new lobby starts with
    pub lobby_defaults: LobbySettings,
    /// Capacity of the outbound broadcast channel
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            lobby_defaults: LobbySettings::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Read and parse a variable. Unset or blank means default; unparseable
/// logs a warning and also means default.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, trimmed);
            None
        }
    }
}

impl ServerConfig {
    /// Load configuration from NIGHTFALL_* environment variables
    pub fn from_env() -> Self {
        let defaults = LobbySettings::default();

        let bind_addr = env_parse("NIGHTFALL_BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR);

        let tick_ms = env_parse::<u64>("NIGHTFALL_TICK_MS")
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TICK_MS);

        let phase_seconds = env_parse::<u32>("NIGHTFALL_PHASE_SECONDS")
            .filter(|s| *s > 0)
            .unwrap_or(defaults.phase_seconds);

        let max_players = env_parse::<usize>("NIGHTFALL_MAX_PLAYERS")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_players);
        let min_players = env_parse::<usize>("NIGHTFALL_MIN_PLAYERS")
            .unwrap_or(defaults.min_players)
            .min(max_players);

        let event_buffer = env_parse::<usize>("NIGHTFALL_EVENT_BUFFER")
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_EVENT_BUFFER);

        Self {
            bind_addr,
            tick_interval: Duration::from_millis(tick_ms),
            lobby_defaults: LobbySettings {
                phase_seconds,
                min_players,
                max_players,
                ..defaults
            },
            event_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "NIGHTFALL_BIND_ADDR",
        "NIGHTFALL_TICK_MS",
        "NIGHTFALL_PHASE_SECONDS",
        "NIGHTFALL_MIN_PLAYERS",
        "NIGHTFALL_MAX_PLAYERS",
        "NIGHTFALL_EVENT_BUFFER",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        let config = ServerConfig::from_env();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.lobby_defaults, LobbySettings::default());
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        std::env::set_var("NIGHTFALL_BIND_ADDR", "127.0.0.1:8080");
        std::env::set_var("NIGHTFALL_TICK_MS", "50");
        std::env::set_var("NIGHTFALL_PHASE_SECONDS", " 30 ");
        std::env::set_var("NIGHTFALL_MIN_PLAYERS", "5");
        std::env::set_var("NIGHTFALL_MAX_PLAYERS", "8");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.lobby_defaults.phase_seconds, 30);
        assert_eq!(config.lobby_defaults.min_players, 5);
        assert_eq!(config.lobby_defaults.max_players, 8);
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("NIGHTFALL_BIND_ADDR", "not an address");
        std::env::set_var("NIGHTFALL_TICK_MS", "0");
        std::env::set_var("NIGHTFALL_PHASE_SECONDS", "soon");
        std::env::set_var("NIGHTFALL_MIN_PLAYERS", "20");
        std::env::set_var("NIGHTFALL_MAX_PLAYERS", "10");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.lobby_defaults.phase_seconds, 120);
        // Clamped to max
        assert_eq!(config.lobby_defaults.min_players, 10);
    }
}
