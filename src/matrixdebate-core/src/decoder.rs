//! Incremental decoding of a newline-delimited JSON byte stream.
//!
//! Chunks arrive with arbitrary boundaries: a line, or a single UTF-8
//! character, may be split across any number of chunks. [`LineDecoder`]
//! reassembles complete lines; [`EventDecoder`] parses them into
//! [`StreamEvent`]s and skips lines that are not valid events.

use crate::event::StreamEvent;

/// Splits a chunked byte stream into complete, non-blank lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Text after the last newline seen so far.
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every line it completed, in order.
    ///
    /// Lines are returned untrimmed; blank lines are dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// End of stream: returns the unterminated remainder, if it has content.
    pub fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&rest));
        }
        let rest = self.buffer.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    /// Move every complete UTF-8 sequence from `pending` into `buffer`.
    fn decode_pending(&mut self) {
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = start + e.valid_up_to();
                    // valid_up_to guarantees this slice is UTF-8
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[start..valid]));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start = valid + len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            start = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
    }
}

/// Policy for a final line that was never newline-terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingFragment {
    /// Discard it.
    #[default]
    Drop,
    /// Parse it like any other line.
    Flush,
}

/// Turns a chunked byte stream into parsed [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct EventDecoder {
    lines: LineDecoder,
    trailing: TrailingFragment,
}

impl EventDecoder {
    pub fn new(trailing: TrailingFragment) -> Self {
        Self {
            lines: LineDecoder::new(),
            trailing,
        }
    }

    /// Feed one chunk; returns the events it completed, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.lines
            .push(chunk)
            .iter()
            .filter_map(|line| parse_line(line))
            .collect()
    }

    /// End of stream: applies the trailing-fragment policy.
    pub fn finish(self) -> Option<StreamEvent> {
        let rest = self.lines.finish()?;
        match self.trailing {
            TrailingFragment::Drop => {
                tracing::warn!(
                    bytes = rest.len(),
                    "dropping unterminated final line of debate stream"
                );
                None
            }
            TrailingFragment::Flush => parse_line(&rest),
        }
    }
}

fn parse_line(line: &str) -> Option<StreamEvent> {
    match StreamEvent::parse(line.trim()) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, line, "skipping malformed stream line");
            None
        }
    }
}
