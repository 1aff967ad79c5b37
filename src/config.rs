use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;
use crate::error::{BookvoxError, Result};
use crate::voice;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub synthesis: SynthesisConfig,
    pub reader: ReaderConfig,
    pub playback: PlaybackConfig,
}

/// Remote synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub voice: String,
    /// Preset name or a free-text reading directive; empty disables it.
    pub style: String,
    pub model: String,
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub attempt_timeout_secs: u64,
}

/// Segmentation and prefetch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    pub words_per_segment: usize,
    /// Segments synthesized ahead of the one currently playing.
    pub lookahead: usize,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub device: Option<String>,
    pub lead_in_ms: u64,
    pub speed: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice: defaults::VOICE.to_string(),
            style: defaults::STYLE.to_string(),
            model: defaults::TTS_MODEL.to_string(),
            max_attempts: defaults::MAX_ATTEMPTS,
            backoff_secs: defaults::RETRY_BACKOFF_SECS,
            attempt_timeout_secs: defaults::ATTEMPT_TIMEOUT_SECS,
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            words_per_segment: defaults::WORDS_PER_SEGMENT,
            lookahead: defaults::LOOKAHEAD,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            lead_in_ms: defaults::LEAD_IN_MS,
            speed: 1.0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e.context(format!("failed to load config from {}", path.display())))
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - BOOKVOX_VOICE → synthesis.voice
    /// - BOOKVOX_STYLE → synthesis.style
    /// - BOOKVOX_AUDIO_DEVICE → playback.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(voice) = std::env::var("BOOKVOX_VOICE")
            && !voice.is_empty()
        {
            self.synthesis.voice = voice;
        }

        if let Ok(style) = std::env::var("BOOKVOX_STYLE") {
            // An empty style is a meaningful override: no directive.
            self.synthesis.style = style;
        }

        if let Ok(device) = std::env::var("BOOKVOX_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.playback.device = Some(device);
        }

        self
    }

    /// Check value ranges after all overrides are applied.
    pub fn validate(&self) -> Result<()> {
        if !voice::is_known_voice(&self.synthesis.voice) {
            return Err(BookvoxError::ConfigInvalidValue {
                key: "synthesis.voice".to_string(),
                message: format!(
                    "'{}' is not a known voice (see `bookvox voices`)",
                    self.synthesis.voice
                ),
            });
        }
        if self.synthesis.max_attempts == 0 {
            return Err(BookvoxError::ConfigInvalidValue {
                key: "synthesis.max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.reader.words_per_segment < defaults::MIN_WORDS_PER_SEGMENT
            || self.reader.words_per_segment > defaults::MAX_WORDS_PER_SEGMENT
        {
            return Err(BookvoxError::ConfigInvalidValue {
                key: "reader.words_per_segment".to_string(),
                message: format!(
                    "must be between {} and {}",
                    defaults::MIN_WORDS_PER_SEGMENT,
                    defaults::MAX_WORDS_PER_SEGMENT
                ),
            });
        }
        if self.reader.lookahead < 1 || self.reader.lookahead > defaults::MAX_LOOKAHEAD {
            return Err(BookvoxError::ConfigInvalidValue {
                key: "reader.lookahead".to_string(),
                message: format!("must be between 1 and {}", defaults::MAX_LOOKAHEAD),
            });
        }
        if !(defaults::MIN_SPEED..=defaults::MAX_SPEED).contains(&self.playback.speed) {
            return Err(BookvoxError::ConfigInvalidValue {
                key: "playback.speed".to_string(),
                message: format!(
                    "must be between {} and {}",
                    defaults::MIN_SPEED,
                    defaults::MAX_SPEED
                ),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/bookvox/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("bookvox")
            .join("config.toml")
    }
}

/// Read the synthesis API key from the environment. Never stored in
/// the config file.
pub fn api_key_from_env() -> Result<String> {
    for name in ["VERTEX_API_KEY", "GEMINI_API_KEY"] {
        if let Ok(key) = std::env::var(name)
            && !key.is_empty()
        {
            return Ok(key);
        }
    }
    Err(BookvoxError::ApiKeyMissing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_bookvox_env() {
        remove_env("BOOKVOX_VOICE");
        remove_env("BOOKVOX_STYLE");
        remove_env("BOOKVOX_AUDIO_DEVICE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.synthesis.voice, "Puck");
        assert_eq!(config.synthesis.style, "Narrator");
        assert_eq!(config.synthesis.model, defaults::TTS_MODEL);
        assert_eq!(config.synthesis.max_attempts, 3);
        assert_eq!(config.synthesis.backoff_secs, 2);
        assert_eq!(config.synthesis.attempt_timeout_secs, 90);

        assert_eq!(config.reader.words_per_segment, 100);
        assert_eq!(config.reader.lookahead, 1);

        assert_eq!(config.playback.device, None);
        assert_eq!(config.playback.lead_in_ms, 40);
        assert_eq!(config.playback.speed, 1.0);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [synthesis]
            voice = "Kore"
            style = "Podcast"
            max_attempts = 2
            backoff_secs = 1

            [reader]
            words_per_segment = 150
            lookahead = 2

            [playback]
            device = "pipewire"
            speed = 1.5
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.synthesis.voice, "Kore");
        assert_eq!(config.synthesis.style, "Podcast");
        assert_eq!(config.synthesis.max_attempts, 2);
        assert_eq!(config.synthesis.backoff_secs, 1);

        assert_eq!(config.reader.words_per_segment, 150);
        assert_eq!(config.reader.lookahead, 2);

        assert_eq!(config.playback.device, Some("pipewire".to_string()));
        assert_eq!(config.playback.speed, 1.5);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [synthesis]
            voice = "Sulafat"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.synthesis.voice, "Sulafat");

        // Everything else should be defaults
        assert_eq!(config.synthesis.style, "Narrator");
        assert_eq!(config.reader.words_per_segment, 100);
        assert_eq!(config.reader.lookahead, 1);
        assert_eq!(config.playback.device, None);
    }

    #[test]
    fn test_env_override_voice() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_bookvox_env();

        set_env("BOOKVOX_VOICE", "Gacrux");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.voice, "Gacrux");
        assert_eq!(config.synthesis.style, "Narrator"); // Not overridden

        clear_bookvox_env();
    }

    #[test]
    fn test_env_override_style_empty_disables_directive() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_bookvox_env();

        set_env("BOOKVOX_STYLE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.style, "");

        clear_bookvox_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_bookvox_env();

        set_env("BOOKVOX_VOICE", "Leda");
        set_env("BOOKVOX_STYLE", "Storyteller");
        set_env("BOOKVOX_AUDIO_DEVICE", "pulse");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.voice, "Leda");
        assert_eq!(config.synthesis.style, "Storyteller");
        assert_eq!(config.playback.device, Some("pulse".to_string()));

        clear_bookvox_env();
    }

    #[test]
    fn test_env_override_empty_voice_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_bookvox_env();

        set_env("BOOKVOX_VOICE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.voice, "Puck");

        clear_bookvox_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [synthesis
            voice = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_voice() {
        let mut config = Config::default();
        config.synthesis.voice = "NotAVoice".to_string();
        assert!(matches!(
            config.validate(),
            Err(BookvoxError::ConfigInvalidValue { key, .. }) if key == "synthesis.voice"
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_words() {
        let mut config = Config::default();
        config.reader.words_per_segment = 10;
        assert!(config.validate().is_err());

        config.reader.words_per_segment = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_lookahead() {
        let mut config = Config::default();
        config.reader.lookahead = 0;
        assert!(config.validate().is_err());

        config.reader.lookahead = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_speed() {
        let mut config = Config::default();
        config.playback.speed = 0.1;
        assert!(config.validate().is_err());

        config.playback.speed = 8.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains(".config"));
        assert!(path_str.contains("bookvox"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_bookvox_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let invalid_toml = r#"
            [synthesis
            voice = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_api_key_prefers_vertex() {
        let _lock = ENV_LOCK.lock().unwrap();
        remove_env("VERTEX_API_KEY");
        remove_env("GEMINI_API_KEY");

        assert!(matches!(api_key_from_env(), Err(BookvoxError::ApiKeyMissing)));

        set_env("GEMINI_API_KEY", "gem");
        assert_eq!(api_key_from_env().unwrap(), "gem");

        set_env("VERTEX_API_KEY", "vtx");
        assert_eq!(api_key_from_env().unwrap(), "vtx");

        remove_env("VERTEX_API_KEY");
        remove_env("GEMINI_API_KEY");
    }
}
