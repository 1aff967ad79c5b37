//! Error types for bookvox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookvoxError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Document / segmentation errors
    #[error("Nothing to read: {detail}")]
    SegmentationEmpty { detail: String },

    #[error("Failed to load document: {message}")]
    DocumentLoad { message: String },

    // Synthesis errors
    #[error("No synthesis API key found (set VERTEX_API_KEY or GEMINI_API_KEY)")]
    ApiKeyMissing,

    #[error("Synthesis request failed: {message}")]
    Http { message: String },

    #[error("Unexpected synthesis response: {message}")]
    ResponseFormat { message: String },

    #[error("Synthesis failed after {attempts} attempt(s): {detail}")]
    SynthesisFailed { attempts: u32, detail: String },

    // Playback errors
    #[error("Audio output device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio output unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Audio segment ingested out of order: expected ordinal {expected}, got {got}")]
    OrdinalOutOfOrder { expected: u64, got: u64 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BookvoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_parse_display() {
        let error = BookvoxError::ConfigParse {
            message: "invalid TOML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration: invalid TOML syntax"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = BookvoxError::ConfigInvalidValue {
            key: "reader.words_per_segment".to_string(),
            message: "must be between 50 and 200".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for reader.words_per_segment: must be between 50 and 200"
        );
    }

    #[test]
    fn test_segmentation_empty_display() {
        let error = BookvoxError::SegmentationEmpty {
            detail: "chapter 'Preface' has no words".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Nothing to read: chapter 'Preface' has no words"
        );
    }

    #[test]
    fn test_api_key_missing_display() {
        let error = BookvoxError::ApiKeyMissing;
        assert!(error.to_string().contains("VERTEX_API_KEY"));
        assert!(error.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_synthesis_failed_display() {
        let error = BookvoxError::SynthesisFailed {
            attempts: 3,
            detail: "empty audio response".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Synthesis failed after 3 attempt(s): empty audio response"
        );
    }

    #[test]
    fn test_device_unavailable_display() {
        let error = BookvoxError::DeviceUnavailable {
            message: "no default output device".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio output unavailable: no default output device"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = BookvoxError::AudioDeviceNotFound {
            device: "pipewire".to_string(),
        };
        assert_eq!(error.to_string(), "Audio output device not found: pipewire");
    }

    #[test]
    fn test_ordinal_out_of_order_display() {
        let error = BookvoxError::OrdinalOutOfOrder {
            expected: 2,
            got: 4,
        };
        assert_eq!(
            error.to_string(),
            "Audio segment ingested out of order: expected ordinal 2, got 4"
        );
    }

    #[test]
    fn test_other_display() {
        let error = BookvoxError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: BookvoxError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: BookvoxError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: BookvoxError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BookvoxError>();
        assert_sync::<BookvoxError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(BookvoxError::Other("test error".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
