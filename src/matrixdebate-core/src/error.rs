//! Error types for the debate client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to start debate stream: server returned {status}")]
    StreamStatus { status: reqwest::StatusCode },

    #[error("Speech synthesis failed: server returned {status}")]
    SpeechStatus { status: reqwest::StatusCode },

    #[error("Invalid audio payload: {0}")]
    AudioPayload(#[from] base64::DecodeError),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
