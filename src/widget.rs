//! Host-facing widget handle
//!
//! Wires the chord router, state machine, shared snapshot, and event
//! broadcast together. The host owns the handle, feeds it raw input,
//! and drives the machine by spawning [`WidgetDriver::run`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::warn;

use crate::chord::{ChordRouter, KeyPress};
use crate::collaborators::{Agent, SpeechCapture};
use crate::config::Config;
use crate::events::WidgetEvent;
use crate::state::{Input, StateMachine, WidgetSnapshot};

/// Handle through which the host surface drives the widget core.
///
/// There is no ambient global keyboard listener: the host decides which
/// key events reach the widget by calling [`key_down`](Self::key_down)
/// and [`key_up`](Self::key_up), and detaches by dropping the handle.
pub struct Widget {
    router: ChordRouter,
    input_tx: mpsc::Sender<Input>,
    event_tx: broadcast::Sender<WidgetEvent>,
    snapshot: Arc<RwLock<WidgetSnapshot>>,
}

/// Owns the state machine until the host spawns it
pub struct WidgetDriver {
    machine: StateMachine,
    input_rx: mpsc::Receiver<Input>,
}

impl WidgetDriver {
    /// Run the state machine until the widget handle is dropped
    pub async fn run(self) {
        self.machine.run(self.input_rx).await;
    }
}

impl Widget {
    /// Build the widget core around the host's collaborators.
    ///
    /// Returns the handle plus the driver future the host must spawn.
    pub fn new(
        config: Config,
        capture: Arc<dyn SpeechCapture>,
        agent: Arc<dyn Agent>,
    ) -> (Self, WidgetDriver) {
        let (input_tx, input_rx) = mpsc::channel(config.input_capacity);
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let snapshot = Arc::new(RwLock::new(WidgetSnapshot::default()));

        let machine = StateMachine::new(
            config,
            capture,
            agent,
            input_tx.clone(),
            event_tx.clone(),
            Arc::clone(&snapshot),
        );

        let widget = Self {
            router: ChordRouter::new(),
            input_tx,
            event_tx,
            snapshot,
        };

        (widget, WidgetDriver { machine, input_rx })
    }

    /// Forward a click on the avatar surface
    pub async fn click(&self) {
        self.send(Input::Click).await;
    }

    /// Forward a raw key-down event
    pub async fn key_down(&mut self, press: KeyPress) {
        if let Some(command) = self.router.key_down(&press) {
            self.send(Input::Command(command)).await;
        }
    }

    /// Forward a raw key-up event
    pub async fn key_up(&mut self, press: KeyPress) {
        if let Some(command) = self.router.key_up(&press) {
            self.send(Input::Command(command)).await;
        }
    }

    /// Submit text from the chat input form
    pub async fn submit_text(&self, text: impl Into<String>) {
        self.send(Input::SubmitText(text.into())).await;
    }

    /// Read the current state snapshot for rendering
    pub async fn snapshot(&self) -> WidgetSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Subscribe to widget event notices
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, input: Input) {
        if self.input_tx.send(input).await.is_err() {
            warn!("widget driver gone, input dropped");
        }
    }
}
