//! Speech synthesis through the remote `/api/speak` endpoint.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DebateError;

/// Encoded audio returned by the synthesis service (mp3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mp3: Vec<u8>,
}

/// Turns text into audio with a given voice.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<AudioClip, DebateError>;
}

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
}

#[derive(Deserialize)]
struct SpeakResponse {
    audio_content: String,
}

/// HTTP client for the speech endpoint.
#[derive(Debug, Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    endpoint: String,
}

impl SpeechClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, DebateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/speak", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Synthesizer for SpeechClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<AudioClip, DebateError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&SpeakRequest { text, voice_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DebateError::SpeechStatus { status });
        }

        let body: SpeakResponse = response.json().await?;
        let mp3 = base64::engine::general_purpose::STANDARD.decode(body.audio_content.trim())?;

        tracing::debug!(voice_id, bytes = mp3.len(), "speech synthesized");
        Ok(AudioClip { mp3 })
    }
}
