//! Debate state and the reducer that folds stream events into it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::VoicesConfig;
use crate::event::StreamEvent;

/// Status shown while the stream is being opened.
pub const STATUS_STARTING: &str = "Initializing The Matrix...";
/// Status shown once the verdict arrived.
pub const STATUS_COMPLETE: &str = "Simulation Complete.";

/// One participant's contribution within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateTurn {
    pub speaker: String,
    pub content: String,
    pub round: u32,
}

/// Accumulated outcome of one debate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateResult {
    /// Turns in stream order.
    pub transcript: Vec<DebateTurn>,
    /// Empty until the verdict arrives.
    pub winner: String,
    /// Fraction in `[0, 1]`; see [`normalize_confidence`].
    pub confidence: f64,
    pub reason: String,
}

impl DebateResult {
    pub fn has_verdict(&self) -> bool {
        !self.winner.is_empty()
    }

    /// Confidence as a whole percentage.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}

/// Text and voice for one speech clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioQueueItem {
    pub text: String,
    pub voice: String,
}

/// Verdict payload as sent by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub winner: String,
    pub confidence: f64,
    pub reason: String,
}

impl Verdict {
    /// Read a verdict from either an object or a JSON-encoded string.
    ///
    /// Never fails: missing or ill-typed fields fall back to empty values.
    pub fn from_content(content: &Value) -> Self {
        let decoded;
        let object = match content {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) => {
                    decoded = value;
                    &decoded
                }
                Err(e) => {
                    tracing::warn!(error = %e, "verdict content is not valid JSON");
                    return Self::default();
                }
            },
            other => other,
        };

        if !object.is_object() {
            tracing::warn!(kind = %json_kind(object), "verdict content is not an object");
        }

        Self {
            winner: object
                .get("winner")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            confidence: normalize_confidence(
                object
                    .get("confidence")
                    .and_then(value_as_f64)
                    .unwrap_or_default(),
            ),
            reason: object
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Sentence the narrator speaks once the verdict is in.
    pub fn announcement(&self) -> String {
        format!(
            "The Oracle has spoken. The winner is {}. {}",
            self.winner, self.reason
        )
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Bring a confidence value into `[0, 1]`.
///
/// The server sometimes reports a percentage instead of a fraction, so values
/// above 1 and up to 100 are divided by 100. Anything else is clamped;
/// non-finite values become 0.
pub fn normalize_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    let fraction = if raw > 1.0 && raw <= 100.0 {
        raw / 100.0
    } else {
        raw
    };
    fraction.clamp(0.0, 1.0)
}

/// What a single event changed, for the views.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Status(String),
    /// Index of the appended turn in the transcript.
    TurnAdded(usize),
    /// Turn was already in the transcript.
    DuplicateTurn,
    Verdict,
    Ignored,
}

/// Everything the views render for the current submission.
#[derive(Debug, Clone, Default)]
pub struct DebateState {
    pub topic: String,
    pub status: String,
    pub loading: bool,
    pub error: Option<String>,
    pub result: Option<DebateResult>,
}

impl DebateState {
    /// Fresh state for a new submission.
    pub fn start(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            status: STATUS_STARTING.to_string(),
            loading: true,
            error: None,
            result: Some(DebateResult::default()),
        }
    }

    /// Record a failure to open or read the stream.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.loading = false;
    }

    pub fn transcript(&self) -> &[DebateTurn] {
        self.result
            .as_ref()
            .map(|r| r.transcript.as_slice())
            .unwrap_or_default()
    }

    /// Fold one event into the state.
    ///
    /// Returns what changed and the speech clip the event produced, if any.
    pub fn apply(
        &mut self,
        event: StreamEvent,
        voices: &VoicesConfig,
    ) -> (Change, Option<AudioQueueItem>) {
        match event {
            StreamEvent::Info { message } => {
                self.status = message.clone();
                (Change::Status(message), None)
            }
            StreamEvent::Turn {
                speaker,
                content,
                round,
            } => {
                let turn = DebateTurn {
                    round: round.unwrap_or(1),
                    speaker,
                    content,
                };
                let result = self.result.get_or_insert_with(DebateResult::default);

                if result
                    .transcript
                    .iter()
                    .any(|t| t.speaker == turn.speaker && t.content == turn.content)
                {
                    tracing::debug!(speaker = %turn.speaker, "ignoring duplicate turn");
                    return (Change::DuplicateTurn, None);
                }

                let item = AudioQueueItem {
                    text: turn.content.clone(),
                    voice: voices.voice_for_speaker(&turn.speaker).to_string(),
                };
                result.transcript.push(turn);
                (Change::TurnAdded(result.transcript.len() - 1), Some(item))
            }
            StreamEvent::Verdict { content } => {
                let verdict = Verdict::from_content(&content);

                if let Some(result) = self.result.as_mut() {
                    result.winner = verdict.winner.clone();
                    result.confidence = verdict.confidence;
                    result.reason = verdict.reason.clone();
                } else {
                    tracing::debug!("verdict arrived before any result; not merged");
                }

                self.loading = false;
                self.status = STATUS_COMPLETE.to_string();

                let item = AudioQueueItem {
                    text: verdict.announcement(),
                    voice: voices.narrator().to_string(),
                };
                (Change::Verdict, Some(item))
            }
            StreamEvent::Unknown => (Change::Ignored, None),
        }
    }
}

/// Transcript turns grouped by round, in ascending round order.
///
/// Arrival order is kept within each group.
pub fn group_by_round(transcript: &[DebateTurn]) -> Vec<(u32, Vec<&DebateTurn>)> {
    let mut rounds: Vec<u32> = transcript.iter().map(|t| t.round).collect();
    rounds.sort_unstable();
    rounds.dedup();

    rounds
        .into_iter()
        .map(|round| {
            let turns = transcript.iter().filter(|t| t.round == round).collect();
            (round, turns)
        })
        .collect()
}
