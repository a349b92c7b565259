//! Events carried by the debate stream.
//!
//! Each line of the `application/x-ndjson` body is one JSON object tagged by
//! its `type` field.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One parsed event from the debate stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Progress message for the status line.
    Info { message: String },
    /// One participant's contribution.
    Turn {
        speaker: String,
        content: String,
        /// Absent, null, zero and non-numeric rounds all read as `None`.
        #[serde(default, deserialize_with = "lenient_round")]
        round: Option<u32>,
    },
    /// Final adjudication. Either an object or a JSON-encoded string of one.
    Verdict { content: Value },
    /// Any `type` this client does not know.
    #[serde(other)]
    Unknown,
}

fn lenient_round<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let round = value.and_then(|v| match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    });
    Ok(round
        .filter(|r| *r > 0)
        .map(|r| u32::try_from(r).unwrap_or(u32::MAX)))
}

impl StreamEvent {
    /// Parse a single stream line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
