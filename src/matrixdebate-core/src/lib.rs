//! Matrix Debate Core Library
//!
//! Streams a simulated debate from the debate service, folds its events into
//! a transcript and verdict, and speaks every turn through a strictly
//! sequential speech queue.

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod layout;
pub mod participant;
pub mod playback;
pub mod queue;
pub mod session;
pub mod state;
pub mod tts;

#[cfg(test)]
mod test_support;

pub use client::{DebateClient, DebateStream};
pub use config::{Config, ViewKind};
pub use decoder::{EventDecoder, LineDecoder, TrailingFragment};
pub use error::DebateError;
pub use event::StreamEvent;
pub use participant::{PanelSide, Participant};
pub use playback::{AudioSink, CommandSink, SinkChain, WavRecorder};
pub use queue::{AudioQueue, AudioQueueHandle, PlaybackSummary, PlaybackWorker};
pub use session::{DebateSession, SessionCallback, SessionUpdate};
pub use state::{AudioQueueItem, DebateResult, DebateState, DebateTurn};
pub use tts::{AudioClip, SpeechClient, Synthesizer};
