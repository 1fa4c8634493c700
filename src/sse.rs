//! Server-Sent Events (SSE) framing for streaming responses.
//!
//! This module turns the raw byte stream of an HTTP response into `{event, data}` frames.  It
//! knows nothing about chat payloads; [`crate::stream`] decodes the frame data.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::STREAM_BYTES;
use crate::{Error, Result};

/// Event name used when a frame has no `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The event name.
    pub event: String,
    /// The data lines, joined with `\n`.
    pub data: String,
}

impl SseFrame {
    /// Creates a new frame.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Process a stream of bytes into a stream of server-sent event frames.
///
/// Bytes are buffered until a blank line completes a frame, so frames and multi-byte characters
/// may be split arbitrarily across chunks.  A trailing frame that lacks its blank line is emitted
/// when the byte stream ends.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<SseFrame>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold((stream, buffer, false), move |(mut stream, mut buffer, done)| async move {
        if done {
            return None;
        }
        loop {
            // First check if we have a complete frame in the buffer
            if let Some(frame_end) = find_frame_end(&buffer) {
                let rest = buffer.split_off(frame_end.consumed);
                let frame = decode_frame(&buffer[..frame_end.end]);
                buffer = rest;
                match frame {
                    Ok(Some(frame)) => return Some((Ok(frame), (stream, buffer, false))),
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), (stream, buffer, false))),
                }
            }

            // Read more data
            match stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    buffer.extend_from_slice(&bytes);
                }
                Some(Err(e)) => {
                    return Some((Err(e), (stream, buffer, true)));
                }
                None => {
                    // End of stream
                    let remaining = std::mem::take(&mut buffer);
                    return match decode_frame(&remaining) {
                        Ok(Some(frame)) => Some((Ok(frame), (stream, buffer, true))),
                        Ok(None) => None,
                        Err(e) => Some((Err(e), (stream, buffer, true))),
                    };
                }
            }
        }
    })
}

struct FrameEnd {
    /// Length of the frame text, excluding the blank line.
    end: usize,
    /// Bytes to drop from the buffer, including the blank line.
    consumed: usize,
}

/// Find the first blank line in the buffer.
///
/// Accepts `\n` and `\r\n` line endings.
fn find_frame_end(buffer: &[u8]) -> Option<FrameEnd> {
    let mut start = 0;
    while let Some(offset) = buffer[start..].iter().position(|b| *b == b'\n') {
        let line = &buffer[start..start + offset];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Some(FrameEnd {
                end: start,
                consumed: start + offset + 1,
            });
        }
        start += offset + 1;
    }
    None
}

/// Parse the lines of one frame.
///
/// Returns `Ok(None)` for frames that carry no data, such as keep-alive comments.
fn decode_frame(raw: &[u8]) -> Result<Option<SseFrame>> {
    let text = std::str::from_utf8(raw)?;
    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match &mut data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            // id and retry only matter for reconnection, which this client never does.
            _ => {}
        }
    }

    Ok(data.map(|data| SseFrame {
        event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data,
    }))
}
