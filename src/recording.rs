//! Recording coordinator
//!
//! Wraps the speech-capture collaborator and enforces start/stop
//! idempotence: exactly one start/stop pair may be in flight, and a
//! `start` while recording is rejected rather than queued.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::SpeechCapture;

/// Whether audio capture is active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    /// Not capturing
    #[default]
    Idle,
    /// Capture in progress
    Recording,
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording => write!(f, "Recording"),
        }
    }
}

/// Errors surfaced by the recording path
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecorderError {
    /// `start` was called while a recording is already active
    #[error("recorder is already active")]
    Busy,

    /// The capture collaborator failed to start
    #[error("failed to start recording: {0}")]
    StartFailed(String),

    /// The transcription collaborator failed after capture stopped
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
}

/// Future resolving to the transcription of a stopped recording
pub type TranscriptionJob = BoxFuture<'static, Result<Option<String>, RecorderError>>;

/// Owns [`RecordingState`] and serializes access to the capture collaborator
pub struct RecordingCoordinator {
    capture: Arc<dyn SpeechCapture>,
    state: RecordingState,
}

impl RecordingCoordinator {
    /// Create a coordinator in the idle state
    pub fn new(capture: Arc<dyn SpeechCapture>) -> Self {
        Self {
            capture,
            state: RecordingState::Idle,
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Check whether a recording is active
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Start capturing audio.
    ///
    /// Rejected with [`RecorderError::Busy`] while a recording is
    /// active. A collaborator failure leaves the state `Idle`.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if self.is_recording() {
            debug!("start rejected, recording already active");
            return Err(RecorderError::Busy);
        }

        match self.capture.start().await {
            Ok(()) => {
                self.state = RecordingState::Recording;
                info!("recording started");
                Ok(())
            }
            Err(e) => {
                warn!(cause = %e, "recording failed to start");
                Err(RecorderError::StartFailed(e.to_string()))
            }
        }
    }

    /// Stop capturing and hand back the pending transcription.
    ///
    /// No-op returning `None` when not recording. The state returns to
    /// `Idle` immediately: recording has physically stopped even though
    /// the transcription resolves later.
    pub fn stop(&mut self) -> Option<TranscriptionJob> {
        if !self.is_recording() {
            debug!("stop ignored, not recording");
            return None;
        }

        self.state = RecordingState::Idle;
        info!("recording stopped, transcription pending");

        let capture = Arc::clone(&self.capture);
        Some(
            async move {
                capture
                    .stop_and_transcribe()
                    .await
                    .map_err(|e| RecorderError::TranscriptionFailed(e.to_string()))
            }
            .boxed(),
        )
    }
}
