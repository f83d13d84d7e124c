//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::time::DEFAULT_REFRESH_RATE;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// Physics and timer tuning handed to every new match
    pub match_settings: MatchSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let mut match_settings = MatchSettings::default();
        match_settings.refresh_rate = parse_var("REFRESH_RATE", DEFAULT_REFRESH_RATE)?;
        match_settings.scorer_list_length =
            parse_var("SCORER_LIST_LENGTH", match_settings.scorer_list_length)?;
        if match_settings.refresh_rate == 0 {
            return Err(ConfigError::Invalid("REFRESH_RATE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_default(),
            match_settings,
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Tuning shared by every match: arena size, speeds, timers
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSettings {
    /// Simulation ticks per second
    pub refresh_rate: u32,
    pub arena_width: f64,
    pub arena_height: f64,

    /// Speed contributed by held movement input (units/sec per axis)
    pub move_speed: f64,
    /// Velocity multiplier applied once per tick
    pub friction: f64,
    /// Velocity magnitude cap
    pub max_speed: f64,

    pub ball_radius: f64,
    pub goal_height: f64,
    pub goal_width: f64,

    /// Distance from arena center to the spawn half-circles
    pub spawn_radius: f64,
    pub max_player_radius: f64,
    /// Per-player shrink of the starting radius (`max * decay^count`)
    pub player_radius_decay: f64,

    /// Surface-to-surface reach of an impulse
    pub impulse_range: f64,
    /// Speed given by an impulse
    pub impulse_speed: f64,
    /// Seconds between impulses
    pub impulse_cooldown: f64,

    /// Countdown before play starts and after each goal (seconds)
    pub goal_countdown: f64,
    /// Top scorers listed in the end-of-match summary
    pub scorer_list_length: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            refresh_rate: DEFAULT_REFRESH_RATE,
            arena_width: 16.0,
            arena_height: 9.0,
            move_speed: 15.0,
            friction: 0.985,
            max_speed: 500.0,
            ball_radius: 0.25,
            goal_height: 3.0,
            goal_width: 0.2,
            spawn_radius: 4.0,
            max_player_radius: 0.6,
            player_radius_decay: 0.99,
            impulse_range: 1.0,
            impulse_speed: 15.0,
            impulse_cooldown: 1.0,
            goal_countdown: 1.0,
            scorer_list_length: 5,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_describe_the_standard_pitch() {
        let settings = MatchSettings::default();
        assert_eq!(settings.arena_width, 16.0);
        assert_eq!(settings.arena_height, 9.0);
        assert_eq!(settings.refresh_rate, 100);
        assert!(settings.friction < 1.0);
        assert_eq!(settings.max_speed, 500.0);
    }
}
