//! companion-demo: drive the widget core from a terminal
//!
//! Wires the core to scripted stand-in collaborators and maps stdin
//! lines to widget inputs, printing events and snapshots. Useful for
//! poking at the mode choreography without a rendering layer:
//!
//! ```text
//! click        click the avatar
//! v            hold and release the voice chord
//! t            press the chat chord
//! say <text>   submit chat text
//! esc          press Escape
//! show         print the current snapshot
//! dump         print the snapshot as JSON
//! quit         exit
//! ```

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use companion_widget::{
    Agent, ChunkStream, Config, KeyPress, ResponseChunk, SpeechCapture, Widget,
};

/// Pretends to record, cycling through canned transcriptions
#[derive(Default)]
struct DemoCapture {
    calls: Mutex<usize>,
}

const PHRASES: &[&str] = &[
    "what can you do",
    "tell me a joke",
    "",
];

#[async_trait]
impl SpeechCapture for DemoCapture {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_and_transcribe(&self) -> Result<Option<String>> {
        // Small delay to mimic a transcription round trip
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut calls = self.calls.lock().unwrap();
        let phrase = PHRASES[*calls % PHRASES.len()];
        *calls += 1;
        Ok(Some(phrase.to_string()))
    }
}

/// Streams a canned reply word by word
struct DemoAgent;

#[async_trait]
impl Agent for DemoAgent {
    async fn send_message(&self, text: &str) -> Result<ChunkStream> {
        let reply = format!(
            "You said \"{text}\". I am a scripted agent, so that is all I have."
        );
        let words: Vec<String> = reply
            .split_inclusive(' ')
            .map(String::from)
            .collect();

        Ok(stream::iter(words)
            .then(|word| async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                Ok(ResponseChunk::assistant(word))
            })
            .boxed())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "companion-demo starting"
    );

    let config = Config::load()?;
    let (mut widget, driver) = Widget::new(config, Arc::new(DemoCapture::default()), Arc::new(DemoAgent));
    tokio::spawn(driver.run());

    // Print every widget event as it happens
    let mut events = widget.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("  [event] {event}"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    println!("  [event] (skipped {n})");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("companion-demo ready; try: click, v, t, say <text>, esc, show, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut widget, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    info!("companion-demo stopped");
    Ok(())
}

/// Map one stdin line to widget input; false means quit
async fn handle_line(widget: &mut Widget, line: &str) -> bool {
    match line {
        "" => {}
        "quit" | "q" => return false,
        "click" => widget.click().await,
        "v" => {
            widget.key_down(KeyPress::chord('v')).await;
            // Hold the chord long enough to "speak"
            tokio::time::sleep(Duration::from_millis(500)).await;
            widget.key_up(KeyPress::chord('v')).await;
        }
        "t" => {
            widget.key_down(KeyPress::chord('t')).await;
            widget.key_up(KeyPress::chord('t')).await;
        }
        "esc" => widget.key_down(KeyPress::escape()).await,
        "dump" => match serde_json::to_string_pretty(&widget.snapshot().await) {
            Ok(json) => println!("{json}"),
            Err(e) => println!("  snapshot serialization failed: {e}"),
        },
        "show" => {
            let snapshot = widget.snapshot().await;
            println!("  mode: {}", snapshot.mode);
            println!("  recording: {}", snapshot.recording);
            println!(
                "  generating: {} ({} chars buffered)",
                snapshot.streaming.is_generating,
                snapshot.streaming.buffer.len()
            );
            for message in snapshot.transcript.messages() {
                let who = if message.is_user { "you" } else { "agent" };
                println!("  {who}: {}", message.text);
            }
        }
        other => {
            if let Some(text) = other.strip_prefix("say ") {
                widget.submit_text(text).await;
            } else {
                println!("  unknown command: {other}");
            }
        }
    }
    true
}
