//! Shared plumbing for server-sent-event completion streams.
//!
//! Each wire protocol supplies a [`SseDecoder`]; this module turns an HTTP
//! response into the canonical [`EventStream`], stopping after the first
//! `Done` or error.

use std::collections::VecDeque;
use std::pin::Pin;

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::stream::{self, Stream, StreamExt};
use tracing::trace;

use telos_tool_runtime::{EventStream, LlmError, StreamEvent};

/// Stateful translator from raw SSE events to canonical stream events.
pub(crate) trait SseDecoder: Send + 'static {
    /// Handle one SSE event. `event` is the SSE event name (`"message"` when absent).
    fn handle(&mut self, event: &str, data: &str) -> Result<Vec<StreamEvent>, LlmError>;

    /// Called once when the body ends. Returns whatever can still be emitted.
    fn finish(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        Ok(Vec::new())
    }
}

/// Map a non-success response to an [`LlmError`], or pass it through.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(LlmError::AuthError(body)),
        code => Err(LlmError::ApiError {
            status: code,
            message: body,
        }),
    }
}

type RawEvents = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

struct PumpState<D> {
    events: RawEvents,
    decoder: D,
    pending: VecDeque<Result<StreamEvent, LlmError>>,
    finished: bool,
}

impl<D: SseDecoder> PumpState<D> {
    fn enqueue(&mut self, decoded: Result<Vec<StreamEvent>, LlmError>) {
        match decoded {
            Ok(events) => {
                if events.iter().any(|e| matches!(e, StreamEvent::Done { .. })) {
                    self.finished = true;
                }
                self.pending.extend(events.into_iter().map(Ok));
            }
            Err(e) => {
                self.finished = true;
                self.pending.push_back(Err(e));
            }
        }
    }
}

/// Decode an SSE response body with `decoder`.
pub(crate) fn decode_response<D: SseDecoder>(response: reqwest::Response, decoder: D) -> EventStream {
    let state = PumpState {
        events: Box::pin(response.bytes_stream().eventsource()),
        decoder,
        pending: VecDeque::new(),
        finished: false,
    };

    let stream = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.events.next().await {
                Some(Ok(event)) => {
                    trace!(event = %event.event, "sse event");
                    let decoded = state.decoder.handle(&event.event, &event.data);
                    state.enqueue(decoded);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    let error = match e {
                        EventStreamError::Transport(e) => LlmError::NetworkError(e.to_string()),
                        other => LlmError::MalformedStream(other.to_string()),
                    };
                    return Some((Err(error), state));
                }
                None => {
                    let decoded = state.decoder.finish();
                    state.enqueue(decoded);
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(stream)
}
