//! Application configuration

pub mod characters;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use characters::{CharacterProfile, CharacterRoster};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// TOML roster to load instead of the built-in characters
    pub characters_path: Option<PathBuf>,
    pub session: SessionSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SessionSettings::default();

        let session = SessionSettings {
            reply_delay: env_millis("HISTORYAI_REPLY_DELAY_MS").unwrap_or(defaults.reply_delay),
            reveal_interval: env_millis("HISTORYAI_REVEAL_INTERVAL_MS")
                .unwrap_or(defaults.reveal_interval),
            throttle_window: env_millis("HISTORYAI_THROTTLE_MS")
                .unwrap_or(defaults.throttle_window),
            max_chars: env::var("HISTORYAI_MAX_MESSAGE_CHARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_chars),
            idle_timeout: env::var("HISTORYAI_SESSION_IDLE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
        };
        session.validate()?;

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            characters_path: env::var("HISTORYAI_CHARACTERS").ok().map(PathBuf::from),
            session,
        })
    }

    /// Roster from `characters_path`, or the built-in one
    pub fn load_roster(&self) -> Result<CharacterRoster, ConfigError> {
        match &self.characters_path {
            Some(path) => CharacterRoster::from_file(path),
            None => Ok(CharacterRoster::builtin()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            characters_path: None,
            session: SessionSettings::default(),
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

/// Timing and validation limits of a conversation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Simulated latency before the reply starts revealing
    pub reply_delay: Duration,

    /// Gap between two revealed words
    pub reveal_interval: Duration,

    /// Minimum spacing between two accepted submissions
    pub throttle_window: Duration,

    /// Maximum length of a trimmed message, in characters
    pub max_chars: usize,

    /// Unobserved sessions untouched this long are closed by the sweeper
    pub idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(1500),
            reveal_interval: Duration::from_millis(120),
            throttle_window: Duration::from_millis(5000),
            max_chars: 1500,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reveal_interval.is_zero() {
            return Err(ConfigError::Validation(
                "reveal interval must be greater than zero".into(),
            ));
        }
        if self.max_chars == 0 {
            return Err(ConfigError::Validation(
                "maximum message length must be greater than zero".into(),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "session idle timeout must be greater than zero".into(),
            ));
        }
        // A pending reply must reach its reveal stage before the throttle
        // lets another submission through.
        if self.reply_delay >= self.throttle_window {
            return Err(ConfigError::Validation(format!(
                "reply delay ({}ms) must be shorter than the throttle window ({}ms)",
                self.reply_delay.as_millis(),
                self.throttle_window.as_millis()
            )));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = SessionSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.throttle_window, Duration::from_secs(5));
        assert_eq!(settings.max_chars, 1500);
    }

    #[test]
    fn test_delay_must_be_shorter_than_throttle() {
        let settings = SessionSettings {
            reply_delay: Duration::from_secs(5),
            ..SessionSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = SessionSettings {
            reveal_interval: Duration::ZERO,
            ..SessionSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let settings = SessionSettings {
            idle_timeout: Duration::ZERO,
            ..SessionSettings::default()
        };
        assert!(settings.validate().is_err());
        assert_eq!(
            SessionSettings::default().idle_timeout,
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn test_default_config_uses_builtin_roster() {
        let config = Config::default();
        let roster = config.load_roster().unwrap();
        assert_eq!(roster.len(), 3);
    }
}
