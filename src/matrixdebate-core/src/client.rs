//! HTTP client for the streaming debate endpoint.

use serde::Serialize;
use std::time::Duration;

use crate::decoder::{EventDecoder, TrailingFragment};
use crate::error::DebateError;
use crate::event::StreamEvent;

#[derive(Serialize)]
struct DebateRequest<'a> {
    question: &'a str,
}

/// Opens debate streams against `{base}/api/debate/stream`.
#[derive(Debug, Clone)]
pub struct DebateClient {
    http: reqwest::Client,
    endpoint: String,
    trailing: TrailingFragment,
}

impl DebateClient {
    pub fn new(base_url: &str) -> Result<Self, DebateError> {
        // No overall timeout: a debate stream stays open for minutes.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/debate/stream", base_url.trim_end_matches('/')),
            trailing: TrailingFragment::Drop,
        })
    }

    /// Set how an unterminated final line is handled.
    pub fn with_trailing_fragment(mut self, trailing: TrailingFragment) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit a question and return the open event stream.
    pub async fn open(&self, question: &str) -> Result<DebateStream, DebateError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .json(&DebateRequest { question })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DebateError::StreamStatus { status });
        }

        tracing::debug!(endpoint = %self.endpoint, "debate stream opened");
        Ok(DebateStream {
            response,
            decoder: Some(EventDecoder::new(self.trailing)),
        })
    }
}

/// An open debate response body, read chunk by chunk.
pub struct DebateStream {
    response: reqwest::Response,
    /// `None` once the body is exhausted.
    decoder: Option<EventDecoder>,
}

impl DebateStream {
    /// Events from the next body chunk.
    ///
    /// Returns `Ok(None)` at end of stream. A chunk may complete no events,
    /// in which case an empty vector is returned.
    pub async fn next_events(&mut self) -> Result<Option<Vec<StreamEvent>>, DebateError> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        match self.response.chunk().await? {
            Some(chunk) => Ok(Some(decoder.push(&chunk))),
            None => {
                let tail = self.decoder.take().and_then(EventDecoder::finish);
                Ok(tail.map(|event| vec![event]))
            }
        }
    }
}
