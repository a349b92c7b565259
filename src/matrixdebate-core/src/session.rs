//! Debate session: submission, stream consumption and state updates.
//!
//! Each submission bumps a generation counter. Events read by an older
//! submission's stream are discarded, so a superseded stream can never write
//! into the new transcript or audio queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::client::DebateClient;
use crate::config::VoicesConfig;
use crate::error::DebateError;
use crate::event::StreamEvent;
use crate::queue::AudioQueueHandle;
use crate::state::{Change, DebateResult, DebateState, DebateTurn};

/// Notifications for the views, in the order state changed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// A new submission replaced everything.
    Reset { topic: String },
    Status(String),
    TurnAdded { index: usize, turn: DebateTurn },
    Verdict(DebateResult),
    /// The stream could not be opened or broke off.
    Failed(String),
    /// The server closed the stream.
    StreamEnded,
}

/// Callback for session updates.
pub type SessionCallback = Box<dyn Fn(SessionUpdate) + Send + Sync>;

struct Inner {
    client: DebateClient,
    voices: VoicesConfig,
    audio: AudioQueueHandle,
    state: Mutex<DebateState>,
    generation: AtomicU64,
    callback: Option<SessionCallback>,
}

/// Runs debates against one service. Cheap to clone.
#[derive(Clone)]
pub struct DebateSession {
    inner: Arc<Inner>,
}

impl DebateSession {
    pub fn new(client: DebateClient, voices: VoicesConfig, audio: AudioQueueHandle) -> Self {
        Self::build(client, voices, audio, None)
    }

    pub fn with_callback(
        client: DebateClient,
        voices: VoicesConfig,
        audio: AudioQueueHandle,
        callback: SessionCallback,
    ) -> Self {
        Self::build(client, voices, audio, Some(callback))
    }

    fn build(
        client: DebateClient,
        voices: VoicesConfig,
        audio: AudioQueueHandle,
        callback: Option<SessionCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                voices,
                audio,
                state: Mutex::new(DebateState::default()),
                generation: AtomicU64::new(0),
                callback,
            }),
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> DebateState {
        self.inner.state.lock().await.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Run one debate to the end of its stream.
    ///
    /// Blank topics are ignored. Stream failures are recorded in the state
    /// and reported through the callback before being returned. A submission
    /// that gets superseded stops reading and returns `Ok`.
    pub async fn submit(&self, topic: &str) -> Result<(), DebateError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Ok(());
        }

        let token = self.reset(topic).await;
        tracing::info!(topic, generation = token, "debate submitted");

        let mut stream = match self.inner.client.open(topic).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(token, &e).await;
                return Err(e);
            }
        };

        loop {
            let events = match stream.next_events().await {
                Ok(Some(events)) => events,
                Ok(None) => break,
                Err(e) => {
                    self.fail(token, &e).await;
                    return Err(e);
                }
            };

            for event in events {
                if !self.apply(token, event).await {
                    tracing::debug!(generation = token, "submission superseded; closing stream");
                    return Ok(());
                }
            }
        }

        self.end(token).await;
        Ok(())
    }

    async fn reset(&self, topic: &str) -> u64 {
        let mut state = self.inner.state.lock().await;
        let token = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *state = DebateState::start(topic);
        self.inner.audio.clear();

        self.emit(SessionUpdate::Reset {
            topic: topic.to_string(),
        });
        self.emit(SessionUpdate::Status(state.status.clone()));
        token
    }

    /// Fold one event in; false if `token` is stale.
    async fn apply(&self, token: u64, event: StreamEvent) -> bool {
        let mut state = self.inner.state.lock().await;
        if !self.is_current(token) {
            return false;
        }

        let (change, item) = state.apply(event, &self.inner.voices);
        if let Some(item) = item {
            self.inner.audio.enqueue(item);
        }

        let update = match change {
            Change::Status(message) => Some(SessionUpdate::Status(message)),
            Change::TurnAdded(index) => Some(SessionUpdate::TurnAdded {
                index,
                turn: state.transcript()[index].clone(),
            }),
            Change::Verdict => {
                self.emit(SessionUpdate::Verdict(
                    state.result.clone().unwrap_or_default(),
                ));
                Some(SessionUpdate::Status(state.status.clone()))
            }
            Change::DuplicateTurn | Change::Ignored => None,
        };
        if let Some(update) = update {
            self.emit(update);
        }
        true
    }

    async fn fail(&self, token: u64, error: &DebateError) {
        let mut state = self.inner.state.lock().await;
        if !self.is_current(token) {
            return;
        }
        tracing::warn!(error = %error, "debate stream failed");
        state.fail(error.to_string());
        self.emit(SessionUpdate::Failed(error.to_string()));
    }

    async fn end(&self, token: u64) {
        let mut state = self.inner.state.lock().await;
        if !self.is_current(token) {
            return;
        }
        if state.loading {
            tracing::warn!("debate stream ended without a verdict");
            state.loading = false;
        }
        self.emit(SessionUpdate::StreamEnded);
    }

    fn is_current(&self, token: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == token
    }

    fn emit(&self, update: SessionUpdate) {
        if let Some(ref callback) = self.inner.callback {
            callback(update);
        }
    }
}
