//! Event feed framing.
//!
//! The scheduler's event stream is a long-poll HTTP response carrying one JSON
//! frame per line. A frame is either a batch of events or a heartbeat (an
//! empty object keeping the connection alive).
//!
//! Framing is line-based and tolerant: blank lines are skipped, and a frame
//! that fails to parse surfaces as a [`StreamError`] for the consumer to log
//! without tearing down the subscription.

use std::future::Future;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The event topic carrying job lifecycle events.
pub const TOPIC_JOB: &str = "Job";

/// Event type emitted when a job (version) is registered.
pub const EVENT_JOB_REGISTERED: &str = "JobRegistered";

/// Errors produced while consuming the event feed.
///
/// Both variants are transport-level from the watcher's point of view: the
/// batch they occurred on is lost, but the subscription keeps going.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying HTTP stream failed while reading a chunk.
    #[error("event transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A frame was not valid JSON of the expected shape.
    #[error("malformed event frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A source of event batches.
///
/// `None` means the stream ended; `Some(Err(_))` is a per-batch transport
/// error that does not end the stream.
pub trait EventSource {
    fn next_batch(
        &mut self,
    ) -> impl Future<Output = Option<Result<EventBatch, StreamError>>> + Send;
}

/// One event within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub topic: String,
    pub event_type: String,

    /// The job definition carried by job-topic events, verbatim.
    pub job: Option<Value>,
}

/// One frame of the event feed: a heartbeat or a set of events sharing an
/// index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventBatch {
    pub index: u64,
    pub events: Vec<StreamEvent>,
}

impl EventBatch {
    /// Heartbeats are empty frames; they carry no index and no events.
    pub fn is_heartbeat(&self) -> bool {
        self.index == 0 && self.events.is_empty()
    }
}

// Wire shape of one frame.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "Index", default)]
    index: u64,
    #[serde(rename = "Events", default)]
    events: Option<Vec<RawEvent>>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "Topic", default)]
    topic: String,
    #[serde(rename = "Type", default)]
    event_type: String,
    #[serde(rename = "Payload", default)]
    payload: Option<Value>,
}

/// Parses a single frame line.
pub(crate) fn parse_frame(line: &[u8]) -> Result<EventBatch, StreamError> {
    let raw: RawFrame = serde_json::from_slice(line)?;

    let events = raw
        .events
        .unwrap_or_default()
        .into_iter()
        .map(|event| {
            let job = event
                .payload
                .as_ref()
                .and_then(|payload| payload.get("Job"))
                .cloned();
            StreamEvent {
                topic: event.topic,
                event_type: event.event_type,
                job,
            }
        })
        .collect();

    Ok(EventBatch {
        index: raw.index,
        events,
    })
}

/// The live event feed: an HTTP byte stream reassembled into frames.
pub struct NomadEventStream {
    chunks: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl NomadEventStream {
    pub(crate) fn new(
        chunks: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    ) -> Self {
        NomadEventStream {
            chunks,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    /// Removes and returns the next complete line from the buffer, without its
    /// trailing newline.
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let newline = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

impl EventSource for NomadEventStream {
    async fn next_batch(&mut self) -> Option<Result<EventBatch, StreamError>> {
        loop {
            while let Some(line) = self.take_line() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Some(parse_frame(&line));
            }

            if self.exhausted {
                // A final frame without a trailing newline is still a frame.
                if self.buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                    let line = std::mem::take(&mut self.buffer);
                    return Some(parse_frame(&line));
                }
                return None;
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Some(Err(StreamError::Transport(e))),
                None => self.exhausted = true,
            }
        }
    }
}

impl std::fmt::Debug for NomadEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NomadEventStream")
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}
