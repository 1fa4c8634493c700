//! Chat event streams.
//!
//! A [`ChatStream`] decodes SSE frames into [`ChatEvent`]s and honors a cancellation token.  It
//! is lazy: nothing, not even the HTTP request, happens until it is first polled.  It yields
//! events in network order, ends when the connection closes, and ends after the first error.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::stream::{self, FusedStream, Stream, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::observability::{STREAM_CANCELLED, STREAM_DURATION, STREAM_ERRORS, STREAM_EVENTS};
use crate::sse::SseFrame;
use crate::types::{ChatEvent, ChatTurnRequest};
use crate::{Error, Result};

/// Something that can open a chat stream for a turn.
pub trait ChatBackend: Send + Sync {
    /// Open a stream for `request`.
    ///
    /// The returned stream must not do any work before it is polled, and must end with
    /// [`Error::Cancelled`] once `cancel` fires.
    fn chat_stream(&self, request: &ChatTurnRequest, cancel: CancellationToken) -> ChatStream;
}

impl<B: ChatBackend + ?Sized> ChatBackend for Arc<B> {
    fn chat_stream(&self, request: &ChatTurnRequest, cancel: CancellationToken) -> ChatStream {
        (**self).chat_stream(request, cancel)
    }
}

/// A cancellable, single-pass stream of chat events.
pub struct ChatStream {
    inner: stream::Fuse<Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>>,
}

struct Pull {
    frames: Pin<Box<dyn Stream<Item = Result<SseFrame>> + Send>>,
    cancel: CancellationToken,
    started: Instant,
}

impl ChatStream {
    /// Decode `frames` into chat events, stopping when `cancel` fires.
    pub fn from_frames<S>(frames: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<SseFrame>> + Send + 'static,
    {
        let pull = Pull {
            frames: Box::pin(frames),
            cancel,
            started: Instant::now(),
        };
        let events = stream::unfold(Some(pull), |state| async move {
            let mut pull = state?;
            let next = tokio::select! {
                biased;
                _ = pull.cancel.cancelled() => Some(Err(Error::cancelled("chat stream cancelled"))),
                frame = pull.frames.next() => frame.map(|frame| frame.and_then(decode_event)),
            };
            match next {
                Some(Ok(event)) => {
                    STREAM_EVENTS.click();
                    Some((Ok(event), Some(pull)))
                }
                Some(Err(err)) => {
                    record_failure(&err);
                    STREAM_DURATION.add(pull.started.elapsed().as_secs_f64());
                    Some((Err(err), None))
                }
                None => {
                    STREAM_DURATION.add(pull.started.elapsed().as_secs_f64());
                    None
                }
            }
        });
        let events: Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>> = Box::pin(events);
        Self {
            inner: events.fuse(),
        }
    }

    /// A stream that yields `err` once, when first polled, and ends.
    pub fn failed(err: Error) -> Self {
        let events: Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>> =
            Box::pin(stream::once(async move {
                record_failure(&err);
                Err(err)
            }));
        Self {
            inner: events.fuse(),
        }
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl FusedStream for ChatStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

/// Parse the data of one frame into a chat event.
pub fn decode_event(frame: SseFrame) -> Result<ChatEvent> {
    let data: Value = serde_json::from_str(&frame.data).map_err(|e| {
        Error::serialization(
            format!("failed to decode `{}` frame: {e}", frame.event),
            Some(Box::new(e)),
        )
    })?;
    Ok(ChatEvent::new(frame.event, data))
}

// Consumers report failures to the user; the stream only counts them.
fn record_failure(err: &Error) {
    if err.is_cancelled() {
        STREAM_CANCELLED.click();
        tracing::debug!("chat stream cancelled");
    } else {
        STREAM_ERRORS.click();
        tracing::debug!(error = %err, "chat stream failed");
    }
}
