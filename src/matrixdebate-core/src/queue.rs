//! Sequential speech playback.
//!
//! Turns and the verdict each produce one [`AudioQueueItem`]. Items are
//! synthesized and played strictly in arrival order, one at a time: the
//! next synthesis request is only sent after the previous clip finished
//! playing or failed.

use std::collections::VecDeque;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::error::DebateError;
use crate::playback::AudioSink;
use crate::state::AudioQueueItem;
use crate::tts::Synthesizer;

/// Where the queue is in handling its head item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Requesting,
    Playing,
}

#[derive(Debug)]
struct Queued {
    id: u64,
    item: AudioQueueItem,
}

/// FIFO of speech clips with at most one item in flight.
///
/// Pure state; [`PlaybackWorker`] drives it.
#[derive(Debug)]
pub struct AudioQueue {
    items: VecDeque<Queued>,
    next_id: u64,
    in_flight: Option<u64>,
    state: PlaybackState,
}

impl Default for AudioQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            next_id: 0,
            in_flight: None,
            state: PlaybackState::Idle,
        }
    }

    /// Append an item; returns its id.
    pub fn enqueue(&mut self, item: AudioQueueItem) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push_back(Queued { id, item });
        id
    }

    /// Start on the head item if nothing is in flight.
    pub fn begin_next(&mut self) -> Option<(u64, AudioQueueItem)> {
        if self.in_flight.is_some() {
            return None;
        }
        let head = self.items.front()?;
        self.in_flight = Some(head.id);
        self.state = PlaybackState::Requesting;
        Some((head.id, head.item.clone()))
    }

    /// Synthesis for the in-flight item succeeded.
    pub fn mark_playing(&mut self, id: u64) {
        if self.in_flight == Some(id) {
            self.state = PlaybackState::Playing;
        }
    }

    /// The in-flight item finished or failed; pop it from the head.
    ///
    /// Returns false if `id` is not the in-flight item.
    pub fn finish(&mut self, id: u64) -> bool {
        if self.in_flight != Some(id) {
            return false;
        }
        if self.items.front().is_some_and(|head| head.id == id) {
            self.items.pop_front();
        }
        self.in_flight = None;
        self.state = PlaybackState::Idle;
        true
    }

    /// Drop every waiting item.
    ///
    /// An item already in flight keeps playing; nothing new starts before it
    /// finishes.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Items still queued, including an in-flight head.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Messages from the session to the playback worker.
#[derive(Debug)]
pub enum QueueCommand {
    Enqueue(AudioQueueItem),
    Clear,
}

/// Sending side of the playback worker.
///
/// A disabled handle silently discards everything.
#[derive(Debug, Clone, Default)]
pub struct AudioQueueHandle {
    tx: Option<mpsc::UnboundedSender<QueueCommand>>,
}

impl AudioQueueHandle {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// A handle wired to a bare receiver, for observing commands.
    #[cfg(test)]
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<QueueCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn enqueue(&self, item: AudioQueueItem) {
        self.send(QueueCommand::Enqueue(item));
    }

    pub fn clear(&self) {
        self.send(QueueCommand::Clear);
    }

    fn send(&self, command: QueueCommand) {
        if let Some(tx) = &self.tx {
            if tx.send(command).is_err() {
                tracing::debug!("playback worker is gone; dropping audio command");
            }
        }
    }
}

/// Outcome counts for one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub played: usize,
    pub failed: usize,
}

/// Owns the queue and drives synthesis and playback.
pub struct PlaybackWorker {
    queue: AudioQueue,
    synthesizer: Box<dyn Synthesizer>,
    sink: Box<dyn AudioSink>,
    commands: mpsc::UnboundedReceiver<QueueCommand>,
    summary: PlaybackSummary,
}

impl PlaybackWorker {
    pub fn new(
        synthesizer: impl Synthesizer + 'static,
        sink: impl AudioSink + 'static,
    ) -> (AudioQueueHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            queue: AudioQueue::new(),
            synthesizer: Box::new(synthesizer),
            sink: Box::new(sink),
            commands: rx,
            summary: PlaybackSummary::default(),
        };
        (AudioQueueHandle { tx: Some(tx) }, worker)
    }

    /// Start the worker on the runtime.
    pub fn spawn(
        synthesizer: impl Synthesizer + 'static,
        sink: impl AudioSink + 'static,
    ) -> (AudioQueueHandle, JoinHandle<Result<PlaybackSummary, DebateError>>) {
        let (handle, worker) = Self::new(synthesizer, sink);
        (handle, tokio::spawn(worker.run()))
    }

    /// Process commands until every handle is dropped and the queue is
    /// drained, then finish the sink.
    pub async fn run(mut self) -> Result<PlaybackSummary, DebateError> {
        let mut open = true;

        loop {
            while open {
                match self.commands.try_recv() {
                    Ok(command) => self.apply(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => open = false,
                }
            }

            if let Some((id, item)) = self.queue.begin_next() {
                self.play_item(id, item).await;
                continue;
            }

            if !open {
                break;
            }

            match self.commands.recv().await {
                Some(command) => self.apply(command),
                None => open = false,
            }
        }

        self.sink.finish().await?;
        tracing::debug!(
            played = self.summary.played,
            failed = self.summary.failed,
            "playback worker finished"
        );
        Ok(self.summary)
    }

    fn apply(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Enqueue(item) => {
                let id = self.queue.enqueue(item);
                tracing::debug!(id, pending = self.queue.len(), "audio item queued");
            }
            QueueCommand::Clear => {
                tracing::debug!(dropped = self.queue.len(), "audio queue cleared");
                self.queue.clear();
            }
        }
    }

    async fn play_item(&mut self, id: u64, item: AudioQueueItem) {
        let outcome = match self.synthesizer.synthesize(&item.text, &item.voice).await {
            Ok(clip) => {
                self.queue.mark_playing(id);
                self.sink.play(&clip).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => self.summary.played += 1,
            Err(e) => {
                self.summary.failed += 1;
                tracing::warn!(id, voice = %item.voice, error = %e, "audio item failed; skipping");
            }
        }
        self.queue.finish(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::AudioClip;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn item(text: &str) -> AudioQueueItem {
        AudioQueueItem {
            text: text.to_string(),
            voice: "v".to_string(),
        }
    }

    #[derive(Default, Clone)]
    struct Log {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl Log {
        fn push(&self, entry: String) {
            self.entries.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    /// Records request start/end and fails on texts listed in `fail`.
    struct MockSynth {
        log: Log,
        fail: Vec<&'static str>,
    }

    #[async_trait]
    impl Synthesizer for MockSynth {
        async fn synthesize(&self, text: &str, _voice_id: &str) -> Result<AudioClip, DebateError> {
            self.log.push(format!("request {}", text));
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.fail.contains(&text) {
                self.log.push(format!("failed {}", text));
                return Err(DebateError::Audio("synthesis refused".to_string()));
            }
            Ok(AudioClip {
                mp3: text.as_bytes().to_vec(),
            })
        }
    }

    struct MockSink {
        log: Log,
    }

    #[async_trait]
    impl AudioSink for MockSink {
        async fn play(&mut self, clip: &AudioClip) -> Result<(), DebateError> {
            let text = String::from_utf8_lossy(&clip.mp3).to_string();
            self.log.push(format!("play {}", text));
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.log.push(format!("done {}", text));
            Ok(())
        }

        async fn finish(&mut self) -> Result<(), DebateError> {
            self.log.push("finish".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_queue_state_machine() {
        let mut queue = AudioQueue::new();
        assert_eq!(queue.state(), PlaybackState::Idle);
        assert!(queue.begin_next().is_none());

        let a = queue.enqueue(item("A"));
        let b = queue.enqueue(item("B"));

        let (id, head) = queue.begin_next().unwrap();
        assert_eq!((id, head.text.as_str()), (a, "A"));
        assert_eq!(queue.state(), PlaybackState::Requesting);
        // Nothing else starts while A is in flight.
        assert!(queue.begin_next().is_none());

        queue.mark_playing(a);
        assert_eq!(queue.state(), PlaybackState::Playing);
        assert!(!queue.finish(b));
        assert!(queue.finish(a));
        assert_eq!(queue.state(), PlaybackState::Idle);

        let (id, _) = queue.begin_next().unwrap();
        assert_eq!(id, b);
    }

    #[test]
    fn test_clear_keeps_in_flight_exclusive() {
        let mut queue = AudioQueue::new();
        let a = queue.enqueue(item("A"));
        queue.enqueue(item("B"));
        queue.begin_next().unwrap();

        queue.clear();
        assert!(queue.is_empty());
        let c = queue.enqueue(item("C"));
        assert!(queue.begin_next().is_none());

        // Finishing A must not pop C.
        assert!(queue.finish(a));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.begin_next().unwrap().0, c);
    }

    #[tokio::test]
    async fn test_worker_plays_in_order_without_overlap() {
        let log = Log::default();
        let (handle, worker) = PlaybackWorker::new(
            MockSynth {
                log: log.clone(),
                fail: vec!["B"],
            },
            MockSink { log: log.clone() },
        );

        handle.enqueue(item("A"));
        handle.enqueue(item("B"));
        handle.enqueue(item("C"));
        drop(handle);

        let summary = worker.run().await.unwrap();
        assert_eq!(summary, PlaybackSummary { played: 2, failed: 1 });
        assert_eq!(
            log.entries(),
            vec![
                "request A", "play A", "done A", "request B", "failed B", "request C", "play C",
                "done C", "finish",
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_clear_drops_pending_items() {
        let log = Log::default();
        let (handle, join) = PlaybackWorker::spawn(
            MockSynth {
                log: log.clone(),
                fail: vec![],
            },
            MockSink { log: log.clone() },
        );

        handle.enqueue(item("A"));
        handle.enqueue(item("B"));
        handle.clear();
        handle.enqueue(item("C"));
        drop(handle);

        join.await.unwrap().unwrap();
        let requests: Vec<String> = log
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("request"))
            .collect();
        // A may already be in flight when the clear lands; B never plays.
        assert!(!requests.contains(&"request B".to_string()));
        assert_eq!(requests.last().map(String::as_str), Some("request C"));
    }

    #[test]
    fn test_disabled_handle_discards() {
        let handle = AudioQueueHandle::disabled();
        assert!(!handle.is_enabled());
        handle.enqueue(item("A"));
        handle.clear();
    }
}
