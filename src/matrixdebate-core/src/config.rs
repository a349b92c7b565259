//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::DebateError;
use crate::participant::Participant;

/// Base URL used when neither the config file nor the environment sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub voices: VoicesConfig,
    #[serde(default)]
    pub avatars: AvatarsConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Remote service location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Voice ids for speech synthesis, one per participant.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    pub neo: String,
    pub morpheus: String,
    pub smith: String,
    /// Narrator voice, used for the verdict announcement.
    #[serde(alias = "narrator")]
    pub oracle: String,
    /// Used for speakers outside the known cast.
    pub fallback: String,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        Self {
            neo: Participant::Neo.default_voice().to_string(),
            morpheus: Participant::Morpheus.default_voice().to_string(),
            smith: Participant::Smith.default_voice().to_string(),
            oracle: Participant::Oracle.default_voice().to_string(),
            fallback: Participant::Neo.default_voice().to_string(),
        }
    }
}

impl VoicesConfig {
    /// Voice for a participant.
    pub fn voice(&self, participant: Participant) -> &str {
        match participant {
            Participant::Neo => &self.neo,
            Participant::Morpheus => &self.morpheus,
            Participant::Smith => &self.smith,
            Participant::Oracle => &self.oracle,
        }
    }

    /// Voice for a free-text speaker name, falling back when unrecognised.
    pub fn voice_for_speaker(&self, speaker: &str) -> &str {
        Participant::from_speaker(speaker)
            .map(|p| self.voice(p))
            .unwrap_or(self.fallback.as_str())
    }

    pub fn narrator(&self) -> &str {
        &self.oracle
    }
}

/// Character artwork references.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AvatarsConfig {
    pub neo: String,
    pub morpheus: String,
    pub smith: String,
    pub oracle: String,
    pub fallback: String,
}

impl Default for AvatarsConfig {
    fn default() -> Self {
        Self {
            neo: Participant::Neo.default_avatar().to_string(),
            morpheus: Participant::Morpheus.default_avatar().to_string(),
            smith: Participant::Smith.default_avatar().to_string(),
            oracle: Participant::Oracle.default_avatar().to_string(),
            fallback: Participant::Neo.default_avatar().to_string(),
        }
    }
}

impl AvatarsConfig {
    pub fn avatar_for_speaker(&self, speaker: &str) -> &str {
        match Participant::from_speaker(speaker) {
            Some(Participant::Neo) => &self.neo,
            Some(Participant::Morpheus) => &self.morpheus,
            Some(Participant::Smith) => &self.smith,
            Some(Participant::Oracle) => &self.oracle,
            None => &self.fallback,
        }
    }
}

/// Stream decoding options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Parse a final line that was never newline-terminated instead of
    /// dropping it.
    pub flush_trailing_fragment: bool,
}

/// Local audio playback options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Player command; receives mp3 bytes on stdin.
    pub player: Vec<String>,
    /// Silence between clips in a recorded WAV.
    pub gap_seconds: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player: ["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet", "-i", "-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            gap_seconds: 0.5,
        }
    }
}

/// Terminal layout to render the debate with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    #[default]
    Comic,
    Grid,
}

/// Presentation options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub view: ViewKind,
    /// Typewriter delay per character, in milliseconds.
    pub typewriter_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            view: ViewKind::Comic,
            typewriter_ms: 10,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the API base URL, e.g. from the environment.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    fn validate(&self) -> Result<(), DebateError> {
        if self.api.base_url.trim().is_empty() {
            return Err(DebateError::ConfigError(
                "api.base_url cannot be empty".to_string(),
            ));
        }
        if self.playback.gap_seconds < 0.0 {
            return Err(DebateError::ConfigError(format!(
                "playback.gap_seconds must be non-negative, got {}",
                self.playback.gap_seconds
            )));
        }
        Ok(())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        api: ApiConfig::default(),
        voices: VoicesConfig::default(),
        avatars: AvatarsConfig::default(),
        stream: StreamConfig::default(),
        playback: PlaybackConfig::default(),
        display: DisplayConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.voices.narrator(), "en-US-Neural2-F");
        assert_eq!(config.display.view, ViewKind::Comic);
        assert!(!config.stream.flush_trailing_fragment);
    }

    #[test]
    fn test_partial_overrides() {
        let config = Config::from_str(
            r#"
            [api]
            base_url = "https://debate.example"

            [voices]
            smith = "en-GB-Neural2-B"

            [display]
            view = "grid"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://debate.example");
        assert_eq!(config.voices.voice_for_speaker("Agent Smith"), "en-GB-Neural2-B");
        assert_eq!(config.voices.voice_for_speaker("Neo"), "en-US-Neural2-D");
        assert_eq!(config.display.view, ViewKind::Grid);
    }

    #[test]
    fn test_narrator_key() {
        let config = Config::from_str("[voices]\nnarrator = \"en-GB-Neural2-C\"\n").unwrap();
        assert_eq!(config.voices.narrator(), "en-GB-Neural2-C");
        assert_eq!(config.voices.voice(Participant::Oracle), "en-GB-Neural2-C");
    }

    #[test]
    fn test_unknown_speaker_falls_back() {
        let config = default_config();
        assert_eq!(config.voices.voice_for_speaker("Trinity"), config.voices.fallback);
        assert_eq!(config.avatars.avatar_for_speaker("Trinity"), "/Neo.png");
    }

    #[test]
    fn test_rejects_empty_base_url() {
        let result = Config::from_str("[api]\nbase_url = \"  \"\n");
        assert!(matches!(result, Err(DebateError::ConfigError(_))));
    }

    #[test]
    fn test_with_base_url() {
        let config = default_config().with_base_url("http://10.0.0.2:9000");
        assert_eq!(config.api.base_url, "http://10.0.0.2:9000");
    }
}
