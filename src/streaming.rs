//! Streaming protocol translation
//!
//! Turns a provider's lazy chunk sequence into client-facing SSE in OpenAI
//! `chat.completion.chunk` shape, and parses provider-native SSE bodies into
//! that chunk sequence. The translator is strictly pull-and-forward: each
//! upstream chunk becomes one flushed event before the next pull, so output
//! order mirrors upstream emission order exactly.

use std::convert::Infallible;
use std::pin::Pin;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};
use crate::wire::{completion_id, StreamChunk};

/// Lazy sequence of provider content deltas.
pub type ChunkStream = Pin<Box<dyn Stream<Item = GatewayResult<String>> + Send>>;

/// Translator lifecycle. Terminal states are `Done` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming,
    Done,
    Failed,
}

/// Observed upstream event, for phase bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk,
    Exhausted,
    Error,
}

impl StreamPhase {
    /// Advance the state machine. Terminal states absorb everything.
    pub fn advance(self, event: StreamEvent) -> StreamPhase {
        match (self, event) {
            (StreamPhase::Idle, StreamEvent::Chunk) => StreamPhase::Streaming,
            (StreamPhase::Idle, StreamEvent::Exhausted) => StreamPhase::Done,
            (StreamPhase::Idle, StreamEvent::Error) => StreamPhase::Failed,
            (StreamPhase::Streaming, StreamEvent::Chunk) => StreamPhase::Streaming,
            (StreamPhase::Streaming, StreamEvent::Exhausted) => StreamPhase::Done,
            (StreamPhase::Streaming, StreamEvent::Error) => StreamPhase::Failed,
            (terminal, _) => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Done | StreamPhase::Failed)
    }
}

/// Format a stream chunk as an SSE data event: `data: {json}\n\n`.
pub fn format_sse_chunk(chunk: &StreamChunk) -> Bytes {
    let json = serde_json::to_string(chunk).expect("StreamChunk should always serialize");
    Bytes::from(format!("data: {}\n\n", json))
}

/// The standard stream termination marker.
pub fn format_sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Translate a provider chunk sequence into OpenAI-shaped SSE events.
///
/// Each non-empty chunk yields exactly one event, in upstream order, with
/// consistent id/created/model metadata. Exhaustion yields one `[DONE]`.
/// An upstream failure logs and ends emission with no `[DONE]`; headers are
/// already committed by then, so the truncated stream is the failure signal.
pub fn sse_events(
    model: String,
    upstream: ChunkStream,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    let id = completion_id();
    let created = chrono::Utc::now().timestamp();

    async_stream::stream! {
        let mut upstream = upstream;
        let mut phase = StreamPhase::Idle;

        while let Some(item) = upstream.next().await {
            match item {
                Ok(delta) => {
                    phase = phase.advance(StreamEvent::Chunk);
                    if delta.is_empty() {
                        continue;
                    }
                    let chunk = StreamChunk::delta(&id, created, &model, delta);
                    yield Ok(format_sse_chunk(&chunk));
                }
                Err(err) => {
                    phase = phase.advance(StreamEvent::Error);
                    warn!(id = %id, model = %model, error = %err, "upstream stream failed mid-flight");
                    break;
                }
            }
        }

        if phase != StreamPhase::Failed {
            yield Ok(format_sse_done());
        }
    }
}

/// Build the `text/event-stream` response around a chunk sequence.
pub fn sse_response(model: &str, chunks: ChunkStream) -> Response {
    let body = Body::from_stream(sse_events(model.to_string(), chunks));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .expect("static response parts are valid")
}

/// A one-chunk sequence, used to coerce a materialized result into a stream
/// when the client asked for streaming delivery.
pub fn single_chunk(content: String) -> ChunkStream {
    Box::pin(futures::stream::once(async move { Ok(content) }))
}

/// Parse a provider-native SSE byte stream into content deltas.
///
/// `extract` pulls the delta text out of one parsed `data:` payload; payloads
/// it returns `None` for (role-only deltas, keep-alives) are skipped. The
/// literal `[DONE]` marker ends the sequence.
pub fn delta_stream(bytes: crate::backend::ByteStream, extract: fn(&Value) -> Option<String>) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut bytes = bytes;
        let mut buffer = SseLineBuffer::new();

        while let Some(item) = bytes.next().await {
            let piece = match item {
                Ok(piece) => piece,
                Err(err) => {
                    yield Err(GatewayError::Http(err));
                    return;
                }
            };

            for line in buffer.feed(&piece) {
                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data == "[DONE]" {
                    return;
                }
                match serde_json::from_str::<Value>(data) {
                    Ok(payload) => {
                        if let Some(delta) = extract(&payload) {
                            yield Ok(delta);
                        }
                    }
                    Err(err) => {
                        yield Err(GatewayError::Upstream {
                            message: format!("malformed stream payload: {}", err),
                            status: None,
                        });
                        return;
                    }
                }
            }
        }
    })
}

/// Buffer for accumulating incomplete SSE lines across chunk boundaries.
///
/// SSE data arrives as byte chunks that may not align with line boundaries;
/// incomplete trailing data is retained until the next feed.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    incomplete: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self {
            incomplete: String::new(),
        }
    }

    /// Feed bytes and return any complete lines, newline stripped. Empty
    /// lines (SSE event separators) are skipped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(bytes);
        self.incomplete.push_str(&text);

        let mut complete_lines = Vec::new();
        while let Some(newline_pos) = self.incomplete.find('\n') {
            let line = self.incomplete[..newline_pos].trim_end_matches('\r').to_string();
            self.incomplete = self.incomplete[newline_pos + 1..].to_string();
            if !line.is_empty() {
                complete_lines.push(line);
            }
        }
        complete_lines
    }

    /// Whether truncated data remains at end of stream.
    pub fn has_incomplete(&self) -> bool {
        !self.incomplete.is_empty()
    }
}
