//! Core state machine implementation
//!
//! Handles transitions between Dormant, Activated, Expanded, ChatActive,
//! and Resetting based on clicks, chord commands, and the completions of
//! the asynchronous recording and agent-streaming paths.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chord::Command;
use crate::collaborators::{Agent, SpeechCapture};
use crate::config::Config;
use crate::events::WidgetEvent;
use crate::recording::{RecorderError, RecordingCoordinator, RecordingState};
use crate::state::transcript::{ChatTranscript, StreamingResponse};
use crate::stream::{StreamAggregator, StreamError};

/// The five possible modes of the widget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetMode {
    /// Avatar idle, waiting for the first click
    #[default]
    Dormant,
    /// Avatar awake after the first click
    Activated,
    /// Listening surface open after the second click or voice chord
    Expanded,
    /// Text chat surface open
    ChatActive,
    /// Transient fade-out, self-clears to Dormant after a fixed delay
    Resetting,
}

impl std::fmt::Display for WidgetMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetMode::Dormant => write!(f, "Dormant"),
            WidgetMode::Activated => write!(f, "Activated"),
            WidgetMode::Expanded => write!(f, "Expanded"),
            WidgetMode::ChatActive => write!(f, "ChatActive"),
            WidgetMode::Resetting => write!(f, "Resetting"),
        }
    }
}

/// Everything the rendering layer needs to draw one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    /// Current authoritative mode
    pub mode: WidgetMode,
    /// Conversation so far
    pub transcript: ChatTranscript,
    /// In-flight agent reply
    pub streaming: StreamingResponse,
    /// Whether audio capture is active
    pub recording: RecordingState,
}

/// Inputs consumed by the state machine.
///
/// Host inputs arrive through [`Widget`](crate::Widget); the remaining
/// variants are completions fed back by the machine's own spawned tasks,
/// keeping all state mutation on one logical thread.
#[derive(Debug)]
pub enum Input {
    /// The avatar surface was clicked
    Click,
    /// A semantic command from the chord router
    Command(Command),
    /// Text submitted from the chat input
    SubmitText(String),
    /// A stopped recording finished (or failed) transcribing
    TranscriptionDone(Result<Option<String>, RecorderError>),
    /// The aggregator applied a chunk; `buffer` is cumulative
    StreamDelta {
        /// Request the delta belongs to
        request_id: u64,
        /// Cumulative reply buffer after the chunk
        buffer: String,
    },
    /// The aggregator finished, one way or another
    StreamDone {
        /// Request the stream belonged to
        request_id: u64,
        /// Final buffer on clean exhaustion, error otherwise
        result: Result<String, StreamError>,
    },
    /// The reset fade-out delay elapsed
    ResetElapsed {
        /// Guards against timers superseded by a newer reset
        generation: u64,
    },
}

/// The state machine that owns the widget mode and transcript
pub struct StateMachine {
    config: Config,
    mode: WidgetMode,
    transcript: ChatTranscript,
    streaming: StreamingResponse,
    recorder: RecordingCoordinator,
    agent: Arc<dyn Agent>,
    /// Id of the youngest agent request; shared with aggregator tasks
    active_request: Arc<AtomicU64>,
    /// Incremented per reset so a superseded timer cannot finalize
    reset_generation: u64,
    reset_timer: Option<JoinHandle<()>>,
    /// Feeds spawned-task completions back into the run loop
    input_tx: mpsc::Sender<Input>,
    event_tx: broadcast::Sender<WidgetEvent>,
    snapshot: Arc<RwLock<WidgetSnapshot>>,
}

impl StateMachine {
    /// Create a new state machine in the Dormant mode
    pub fn new(
        config: Config,
        capture: Arc<dyn SpeechCapture>,
        agent: Arc<dyn Agent>,
        input_tx: mpsc::Sender<Input>,
        event_tx: broadcast::Sender<WidgetEvent>,
        snapshot: Arc<RwLock<WidgetSnapshot>>,
    ) -> Self {
        Self {
            config,
            mode: WidgetMode::Dormant,
            transcript: ChatTranscript::default(),
            streaming: StreamingResponse::default(),
            recorder: RecordingCoordinator::new(capture),
            agent,
            active_request: Arc::new(AtomicU64::new(0)),
            reset_generation: 0,
            reset_timer: None,
            input_tx,
            event_tx,
            snapshot,
        }
    }

    /// Get the current mode
    pub fn mode(&self) -> WidgetMode {
        self.mode
    }

    /// Get the conversation so far
    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    /// Get the in-flight agent reply
    pub fn streaming(&self) -> &StreamingResponse {
        &self.streaming
    }

    /// Get the recording state
    pub fn recording(&self) -> RecordingState {
        self.recorder.state()
    }

    /// Run the state machine, processing inputs until the channel closes
    pub async fn run(mut self, mut input_rx: mpsc::Receiver<Input>) {
        info!("state machine started in Dormant mode");

        while let Some(input) = input_rx.recv().await {
            self.handle_input(input).await;
            self.publish_snapshot().await;
        }

        info!("state machine stopped");
    }

    /// Dispatch a single input
    async fn handle_input(&mut self, input: Input) {
        match input {
            Input::Click => self.handle_click(),
            Input::Command(command) => self.handle_command(command).await,
            Input::SubmitText(text) => self.handle_submit(text),
            Input::TranscriptionDone(result) => self.handle_transcription(result),
            Input::StreamDelta { request_id, buffer } => {
                self.handle_stream_delta(request_id, buffer)
            }
            Input::StreamDone { request_id, result } => {
                self.handle_stream_done(request_id, result)
            }
            Input::ResetElapsed { generation } => self.handle_reset_elapsed(generation),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::ToggleVoice { via_alias } => self.handle_toggle_voice(via_alias).await,
            Command::ReleaseVoice => self.handle_release_voice(),
            Command::ActivateChat { via_alias } => self.handle_activate_chat(via_alias),
            Command::Reset => self.handle_reset(),
        }
    }

    /// First click activates; second click expands
    fn handle_click(&mut self) {
        match self.mode {
            WidgetMode::Dormant => self.transition_to(WidgetMode::Activated),
            WidgetMode::Activated => self.transition_to(WidgetMode::Expanded),
            _ => debug!(mode = %self.mode, "click ignored"),
        }
    }

    fn handle_activate_chat(&mut self, via_alias: bool) {
        // The bare-key alias only acts from Activated
        if via_alias && self.mode != WidgetMode::Activated {
            debug!(mode = %self.mode, "chat alias ignored");
            return;
        }

        match self.mode {
            WidgetMode::Activated | WidgetMode::Expanded => {
                self.transition_to(WidgetMode::ChatActive);
            }
            _ => debug!(mode = %self.mode, "activate-chat ignored"),
        }
    }

    async fn handle_toggle_voice(&mut self, via_alias: bool) {
        if via_alias && self.mode != WidgetMode::Activated {
            debug!(mode = %self.mode, "voice alias ignored");
            return;
        }

        if !matches!(self.mode, WidgetMode::Activated | WidgetMode::Expanded) {
            debug!(mode = %self.mode, "toggle-voice ignored");
            return;
        }

        match self.recorder.start().await {
            Ok(()) => {
                self.emit(WidgetEvent::RecordingStarted);
                self.transition_to(WidgetMode::Expanded);
            }
            Err(RecorderError::Busy) => {
                // Guard violation, not user-visible
                debug!("toggle-voice ignored, already recording");
            }
            Err(e) => {
                // Mode unchanged on failure
                self.emit(WidgetEvent::RecordingStartFailed {
                    cause: e.to_string(),
                });
            }
        }
    }

    /// Voice chord released: stop capture and await the transcription
    fn handle_release_voice(&mut self) {
        let Some(job) = self.recorder.stop() else {
            debug!("release-voice ignored, not recording");
            return;
        };

        self.emit(WidgetEvent::RecordingStopped);

        let tx = self.input_tx.clone();
        tokio::spawn(async move {
            let result = job.await;
            let _ = tx.send(Input::TranscriptionDone(result)).await;
        });
    }

    fn handle_transcription(&mut self, result: Result<Option<String>, RecorderError>) {
        // A reset while transcribing already cleared the transcript
        if matches!(self.mode, WidgetMode::Resetting | WidgetMode::Dormant) {
            debug!(mode = %self.mode, "transcription arrived after reset, discarding");
            return;
        }

        match result {
            Ok(Some(text)) if !text.trim().is_empty() => {
                let text = text.trim().to_string();
                info!(len = text.len(), "transcription ready");
                self.begin_agent_request(text);
            }
            Ok(_) => {
                // Empty transcription: no message, no agent call
                debug!("empty transcription, nothing to send");
            }
            Err(e) => {
                warn!(cause = %e, "transcription failed");
                self.emit(WidgetEvent::TranscriptionFailed {
                    cause: e.to_string(),
                });
            }
        }
    }

    fn handle_submit(&mut self, text: String) {
        if self.mode != WidgetMode::ChatActive {
            debug!(mode = %self.mode, "text submit ignored");
            return;
        }

        let text = text.trim();
        if text.is_empty() {
            debug!("empty submit ignored");
            return;
        }

        self.begin_agent_request(text.to_string());
    }

    /// Append the user/placeholder pair and spawn the streaming fold.
    ///
    /// Allocating a new request id supersedes any stream still arriving
    /// for an older one, so the older fold abandons itself and its
    /// queued deltas are rejected below.
    fn begin_agent_request(&mut self, text: String) {
        let request_id = self.active_request.fetch_add(1, Ordering::SeqCst) + 1;

        self.transcript.push_user(text.clone());
        self.transcript.push_agent_placeholder();
        self.streaming.begin();

        info!(request_id, "agent request started");
        self.emit(WidgetEvent::ResponseStarted { request_id });

        let agent = Arc::clone(&self.agent);
        let active = Arc::clone(&self.active_request);
        let tx = self.input_tx.clone();

        tokio::spawn(async move {
            let result = match agent.send_message(&text).await {
                Ok(stream) => {
                    let aggregator = StreamAggregator::new(request_id, active);
                    let delta_tx = tx.clone();
                    aggregator
                        .run(stream, move |id, buffer| {
                            // Deltas carry the cumulative buffer, so a
                            // dropped one is subsumed by its successor
                            let _ = delta_tx.try_send(Input::StreamDelta {
                                request_id: id,
                                buffer: buffer.to_string(),
                            });
                        })
                        .await
                }
                Err(e) => Err(StreamError::Agent(e.to_string())),
            };

            let _ = tx.send(Input::StreamDone { request_id, result }).await;
        });
    }

    fn handle_stream_delta(&mut self, request_id: u64, buffer: String) {
        if request_id != self.active_request.load(Ordering::SeqCst) {
            debug!(request_id, "stale stream delta rejected");
            return;
        }

        self.transcript.set_last_agent_text(&buffer);
        self.streaming.buffer = buffer;
    }

    fn handle_stream_done(&mut self, request_id: u64, result: Result<String, StreamError>) {
        if request_id != self.active_request.load(Ordering::SeqCst) {
            debug!(request_id, "stale stream completion ignored");
            return;
        }

        match result {
            Ok(buffer) => {
                info!(request_id, len = buffer.len(), "agent reply complete");
                self.transcript.set_last_agent_text(&buffer);
                self.streaming.buffer = buffer;
                self.streaming.finish();
                self.emit(WidgetEvent::ResponseCompleted { request_id });
            }
            Err(StreamError::Superseded) => {
                // Cannot normally happen for the active request
                debug!(request_id, "active stream reported itself superseded");
            }
            Err(StreamError::Agent(cause)) => {
                warn!(request_id, %cause, "agent stream failed");
                // Keep whatever partial reply arrived; just stop generating
                self.streaming.finish();
                self.emit(WidgetEvent::AgentStreamFailed { request_id, cause });
            }
        }
    }

    /// Enter Resetting: clear everything now, settle to Dormant later
    fn handle_reset(&mut self) {
        self.transition_to(WidgetMode::Resetting);

        self.transcript.clear();
        self.streaming.clear();
        // In-flight aggregators see a stale token and abandon
        self.active_request.fetch_add(1, Ordering::SeqCst);

        // A reset inside the delay window supersedes the earlier timer
        self.reset_generation += 1;
        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }

        let generation = self.reset_generation;
        let delay = self.config.reset_delay;
        let tx = self.input_tx.clone();
        self.reset_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Input::ResetElapsed { generation }).await;
        }));
    }

    fn handle_reset_elapsed(&mut self, generation: u64) {
        if generation != self.reset_generation {
            debug!(generation, "superseded reset timer ignored");
            return;
        }
        if self.mode != WidgetMode::Resetting {
            debug!(mode = %self.mode, "reset timer fired outside Resetting");
            return;
        }

        self.reset_timer = None;
        self.transition_to(WidgetMode::Dormant);
    }

    /// Perform a mode transition
    fn transition_to(&mut self, new_mode: WidgetMode) {
        let old_mode = self.mode;
        if new_mode == old_mode {
            return;
        }

        info!(from = %old_mode, to = %new_mode, "mode transition");

        self.mode = new_mode;
        self.emit(WidgetEvent::ModeChanged {
            from: old_mode,
            to: new_mode,
        });
    }

    fn emit(&self, event: WidgetEvent) {
        debug!(%event, "emitting widget event");
        let _ = self.event_tx.send(event);
    }

    /// Refresh the shared snapshot the rendering layer reads
    async fn publish_snapshot(&self) {
        let mut snapshot = self.snapshot.write().await;
        snapshot.mode = self.mode;
        snapshot.transcript = self.transcript.clone();
        snapshot.streaming = self.streaming.clone();
        snapshot.recording = self.recorder.state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use futures::stream;
    use futures::StreamExt;

    use crate::collaborators::{ChunkStream, ResponseChunk};

    struct ScriptedCapture {
        fail_start: bool,
        transcription: Mutex<Option<Result<Option<String>, String>>>,
    }

    impl ScriptedCapture {
        fn transcribing(text: Option<&str>) -> Self {
            Self {
                fail_start: false,
                transcription: Mutex::new(Some(Ok(text.map(String::from)))),
            }
        }

        fn failing_start() -> Self {
            Self {
                fail_start: true,
                transcription: Mutex::new(None),
            }
        }

        fn failing_transcription(cause: &str) -> Self {
            Self {
                fail_start: false,
                transcription: Mutex::new(Some(Err(cause.to_string()))),
            }
        }
    }

    #[async_trait]
    impl SpeechCapture for ScriptedCapture {
        async fn start(&self) -> Result<()> {
            if self.fail_start {
                Err(anyhow!("microphone unavailable"))
            } else {
                Ok(())
            }
        }

        async fn stop_and_transcribe(&self) -> Result<Option<String>> {
            match self.transcription.lock().unwrap().take() {
                Some(Ok(text)) => Ok(text),
                Some(Err(cause)) => Err(anyhow!(cause)),
                None => Ok(None),
            }
        }
    }

    /// Hands out one pre-built stream per send_message call
    struct ScriptedAgent {
        streams: Mutex<VecDeque<ChunkStream>>,
    }

    impl ScriptedAgent {
        fn new(streams: Vec<ChunkStream>) -> Self {
            Self {
                streams: Mutex::new(streams.into_iter().collect()),
            }
        }

        fn replying(texts: &[&str]) -> Self {
            Self::new(vec![chunk_stream(texts)])
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        async fn send_message(&self, _text: &str) -> Result<ChunkStream> {
            Ok(self
                .streams
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| stream::empty().boxed()))
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        async fn send_message(&self, _text: &str) -> Result<ChunkStream> {
            Err(anyhow!("agent unreachable"))
        }
    }

    fn chunk_stream(texts: &[&str]) -> ChunkStream {
        let chunks: Vec<_> = texts
            .iter()
            .map(|t| Ok(ResponseChunk::assistant(*t)))
            .collect();
        stream::iter(chunks).boxed()
    }

    struct Harness {
        machine: StateMachine,
        input_rx: mpsc::Receiver<Input>,
        events: broadcast::Receiver<WidgetEvent>,
    }

    impl Harness {
        fn new(capture: impl SpeechCapture + 'static, agent: impl Agent + 'static) -> Self {
            let config = Config::default().with_reset_delay(Duration::from_millis(20));
            let (input_tx, input_rx) = mpsc::channel(config.input_capacity);
            let (event_tx, events) = broadcast::channel(config.event_capacity);
            let snapshot = Arc::new(RwLock::new(WidgetSnapshot::default()));
            let machine = StateMachine::new(
                config,
                Arc::new(capture),
                Arc::new(agent),
                input_tx,
                event_tx,
                snapshot,
            );
            Self {
                machine,
                input_rx,
                events,
            }
        }

        async fn feed(&mut self, input: Input) {
            self.machine.handle_input(input).await;
        }

        /// Drain spawned-task completions until the machine goes quiet
        async fn pump(&mut self) {
            loop {
                match tokio::time::timeout(Duration::from_millis(100), self.input_rx.recv()).await
                {
                    Ok(Some(input)) => self.machine.handle_input(input).await,
                    _ => break,
                }
            }
        }

        fn drain_events(&mut self) -> Vec<WidgetEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }
    }

    fn voice_harness(transcription: Option<&str>) -> Harness {
        Harness::new(
            ScriptedCapture::transcribing(transcription),
            ScriptedAgent::replying(&["Hi", " there"]),
        )
    }

    #[tokio::test]
    async fn test_initial_mode() {
        let h = voice_harness(None);
        assert_eq!(h.machine.mode(), WidgetMode::Dormant);
        assert!(h.machine.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_click_activation_sequence() {
        let mut h = voice_harness(None);

        h.feed(Input::Click).await;
        assert_eq!(h.machine.mode(), WidgetMode::Activated);

        h.feed(Input::Click).await;
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);

        // Further clicks change nothing
        h.feed(Input::Click).await;
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);
    }

    #[tokio::test]
    async fn test_activate_chat_from_activated_and_expanded() {
        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::ChatActive);

        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::ChatActive);
    }

    #[tokio::test]
    async fn test_activate_chat_ignored_while_dormant() {
        let mut h = voice_harness(None);
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::Dormant);
    }

    #[tokio::test]
    async fn test_chat_alias_gated_on_activated() {
        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::Click).await;
        // Expanded: the alias is refused where the chord would work
        h.feed(Input::Command(Command::ActivateChat { via_alias: true }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);

        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: true }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::ChatActive);
    }

    #[tokio::test]
    async fn test_toggle_voice_starts_recording_and_expands() {
        let mut h = voice_harness(Some("hello"));
        h.feed(Input::Click).await;

        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);
        assert_eq!(h.machine.recording(), RecordingState::Recording);
    }

    #[tokio::test]
    async fn test_toggle_voice_failure_keeps_mode() {
        let mut h = Harness::new(
            ScriptedCapture::failing_start(),
            ScriptedAgent::replying(&[]),
        );
        h.feed(Input::Click).await;

        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::Activated);
        assert_eq!(h.machine.recording(), RecordingState::Idle);

        let events = h.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, WidgetEvent::RecordingStartFailed { .. })));
    }

    #[tokio::test]
    async fn test_toggle_voice_while_recording_is_silent() {
        let mut h = voice_harness(Some("hello"));
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        assert_eq!(h.machine.recording(), RecordingState::Recording);
        h.drain_events();

        // The coordinator's Busy rejection is the guard; not user-visible
        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);
        assert_eq!(h.machine.recording(), RecordingState::Recording);
        let events = h.drain_events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, WidgetEvent::RecordingStartFailed { .. })));
    }

    #[tokio::test]
    async fn test_voice_round_trip_appends_and_streams() {
        let mut h = voice_harness(Some("what time is it"));
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        h.feed(Input::Command(Command::ReleaseVoice)).await;
        assert_eq!(h.machine.recording(), RecordingState::Idle);

        h.pump().await;

        let messages = h.machine.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "what time is it");
        assert!(messages[0].is_user);
        assert_eq!(messages[1].text, "Hi there");
        assert!(!messages[1].is_user);
        assert!(!h.machine.streaming().is_generating);
        assert_eq!(h.machine.streaming().buffer, "Hi there");
    }

    #[tokio::test]
    async fn test_empty_transcription_sends_nothing() {
        let mut h = voice_harness(Some(""));
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        h.feed(Input::Command(Command::ReleaseVoice)).await;
        h.pump().await;

        assert!(h.machine.transcript().is_empty());
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);
        assert!(!h.machine.streaming().is_generating);
    }

    #[tokio::test]
    async fn test_missing_transcription_sends_nothing() {
        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        h.feed(Input::Command(Command::ReleaseVoice)).await;
        h.pump().await;

        assert!(h.machine.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_transcription_failure_surfaces_notice() {
        let mut h = Harness::new(
            ScriptedCapture::failing_transcription("no speech detected"),
            ScriptedAgent::replying(&[]),
        );
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ToggleVoice { via_alias: false }))
            .await;
        h.feed(Input::Command(Command::ReleaseVoice)).await;
        h.pump().await;

        assert!(h.machine.transcript().is_empty());
        assert_eq!(h.machine.mode(), WidgetMode::Expanded);
        let events = h.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            WidgetEvent::TranscriptionFailed { cause } if cause.contains("no speech")
        )));
    }

    #[tokio::test]
    async fn test_chat_scenario_full_round_trip() {
        // Click -> chord t -> submit "hello" -> two chunks
        let mut h = Harness::new(
            ScriptedCapture::transcribing(None),
            ScriptedAgent::replying(&["Hi", " there"]),
        );
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        h.feed(Input::SubmitText("hello".to_string())).await;
        h.pump().await;

        let messages = h.machine.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "hello");
        assert!(messages[0].is_user);
        assert_eq!(messages[1].text, "Hi there");
        assert!(!messages[1].is_user);
        assert!(!h.machine.streaming().is_generating);
    }

    #[tokio::test]
    async fn test_submit_trims_and_rejects_empty() {
        let mut h = Harness::new(
            ScriptedCapture::transcribing(None),
            ScriptedAgent::replying(&["ignored"]),
        );
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;

        h.feed(Input::SubmitText("   ".to_string())).await;
        h.pump().await;
        assert!(h.machine.transcript().is_empty());

        h.feed(Input::SubmitText("  hi  ".to_string())).await;
        h.pump().await;
        assert_eq!(h.machine.transcript().messages()[0].text, "hi");
    }

    #[tokio::test]
    async fn test_submit_outside_chat_mode_ignored() {
        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::SubmitText("hello".to_string())).await;
        h.pump().await;
        assert!(h.machine.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_agent_call_failure_clears_generating() {
        let mut h = Harness::new(ScriptedCapture::transcribing(None), FailingAgent);
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        h.feed(Input::SubmitText("hello".to_string())).await;
        h.pump().await;

        // The user message and the empty placeholder are kept
        assert_eq!(h.machine.transcript().len(), 2);
        assert!(!h.machine.streaming().is_generating);
        let events = h.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, WidgetEvent::AgentStreamFailed { .. })));
    }

    #[tokio::test]
    async fn test_reset_clears_immediately_then_settles_dormant() {
        let mut h = Harness::new(
            ScriptedCapture::transcribing(None),
            ScriptedAgent::replying(&["Hi"]),
        );
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        h.feed(Input::SubmitText("hello".to_string())).await;
        h.pump().await;
        assert_eq!(h.machine.transcript().len(), 2);

        h.feed(Input::Command(Command::Reset)).await;
        // Cleared at the moment Resetting is entered, not at Dormant
        assert_eq!(h.machine.mode(), WidgetMode::Resetting);
        assert!(h.machine.transcript().is_empty());
        assert!(h.machine.streaming().buffer.is_empty());
        assert!(!h.machine.streaming().is_generating);

        // The configured delay elapses and the timer input arrives
        h.pump().await;
        assert_eq!(h.machine.mode(), WidgetMode::Dormant);
    }

    #[tokio::test]
    async fn test_escape_mid_stream_discards_late_chunks() {
        let mut h = Harness::new(
            ScriptedCapture::transcribing(None),
            ScriptedAgent::replying(&["Hi", " there"]),
        );
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;
        h.feed(Input::SubmitText("hello".to_string())).await;

        // Let the stream task queue its deltas, then reset before
        // the machine has applied any of them
        tokio::task::yield_now().await;
        h.feed(Input::Command(Command::Reset)).await;
        assert_eq!(h.machine.mode(), WidgetMode::Resetting);

        h.pump().await;
        // Late deltas and the completion were all rejected as stale
        assert!(h.machine.transcript().is_empty());
        assert!(h.machine.streaming().buffer.is_empty());
        assert_eq!(h.machine.mode(), WidgetMode::Dormant);
    }

    #[tokio::test]
    async fn test_double_reset_restarts_timer() {
        let mut h = voice_harness(None);
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::Reset)).await;
        h.feed(Input::Command(Command::Reset)).await;
        assert_eq!(h.machine.mode(), WidgetMode::Resetting);

        h.pump().await;
        assert_eq!(h.machine.mode(), WidgetMode::Dormant);
    }

    #[tokio::test]
    async fn test_older_stream_cannot_touch_newer_transcript() {
        // Request A's stream stays open while request B completes
        let (mut a_tx, a_rx) = futures::channel::mpsc::channel::<Result<ResponseChunk>>(8);
        let a_stream: ChunkStream = a_rx.boxed();
        let b_stream = chunk_stream(&["B reply"]);

        let mut h = Harness::new(
            ScriptedCapture::transcribing(None),
            ScriptedAgent::new(vec![a_stream, b_stream]),
        );
        h.feed(Input::Click).await;
        h.feed(Input::Command(Command::ActivateChat { via_alias: false }))
            .await;

        h.feed(Input::SubmitText("first".to_string())).await;
        tokio::task::yield_now().await;

        // B supersedes A before A produced anything
        h.feed(Input::SubmitText("second".to_string())).await;
        h.pump().await;

        // A's chunks arrive only now
        a_tx.try_send(Ok(ResponseChunk::assistant("A reply"))).unwrap();
        drop(a_tx);
        h.pump().await;

        let messages = h.machine.transcript().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].text, "second");
        assert_eq!(messages[3].text, "B reply");
        // A's placeholder stayed empty and the buffer still holds B
        assert_eq!(messages[1].text, "");
        assert_eq!(h.machine.streaming().buffer, "B reply");
        assert!(!h.machine.streaming().is_generating);
    }

    #[tokio::test]
    async fn test_reset_from_every_mode() {
        for setup in 0..4 {
            let mut h = voice_harness(None);
            for _ in 0..setup {
                h.feed(Input::Click).await;
            }
            h.feed(Input::Command(Command::Reset)).await;
            assert_eq!(h.machine.mode(), WidgetMode::Resetting);
            h.pump().await;
            assert_eq!(h.machine.mode(), WidgetMode::Dormant);
        }
    }
}
