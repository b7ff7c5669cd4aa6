//! Server-Sent Events (SSE) framing for streaming responses.
//!
//! This module turns an arbitrary byte stream into a stream of [`SseEvent`]s.
//! It is used on both sides of the relay: to read the upstream completion
//! stream and to read the relay's own output in the chat client.
//!
//! Events are delimited by a blank line.  Because the delimiter is pure ASCII,
//! a UTF-8 sequence split across two network chunks is reassembled before it
//! is decoded.  Carriage returns are dropped, so CRLF framing is accepted.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::SSE_BYTES;
use crate::{Error, Result};

/// Largest event accepted before its terminating blank line arrives.
pub const MAX_EVENT_BYTES: usize = 1 << 20;

/// One server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

/// Process a stream of bytes into a stream of server-sent events.
///
/// A transport error is yielded once and ends the stream.  A final event that
/// lacks its trailing blank line is still delivered when the bytes run out.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(
        (stream, Framer::default(), false),
        move |(mut stream, mut framer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // First drain complete events from the buffer
                while let Some(block) = framer.take_block() {
                    match parse_block(&block) {
                        Ok(Some(event)) => return Some((Ok(event), (stream, framer, false))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (stream, framer, false))),
                    }
                }
                if framer.pending() > MAX_EVENT_BYTES {
                    let err = Error::streaming(
                        format!("event exceeds {MAX_EVENT_BYTES} bytes without a delimiter"),
                        None,
                    );
                    return Some((Err(err), (stream, framer, true)));
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        SSE_BYTES.count(bytes.len() as u64);
                        framer.push(&bytes);
                    }
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, framer, true)));
                    }
                    None => {
                        let rest = framer.finish();
                        return match parse_block(&rest) {
                            Ok(Some(event)) => Some((Ok(event), (stream, framer, true))),
                            Ok(None) => None,
                            Err(e) => Some((Err(e), (stream, framer, true))),
                        };
                    }
                }
            }
        },
    )
}

/// Bytes received but not yet split into event blocks.
#[derive(Debug, Default)]
struct Framer {
    buffer: Vec<u8>,
    // Prefix of `buffer` already searched for a delimiter.
    scanned: usize,
}

impl Framer {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Remove and return the first complete event block.
    ///
    /// The search resumes one byte before where the previous search stopped
    /// so a delimiter split across chunks is still found.
    fn take_block(&mut self) -> Option<Vec<u8>> {
        let start = self.scanned.saturating_sub(1);
        let Some(offset) = self.buffer[start..].windows(2).position(|w| w == b"\n\n") else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = start + offset;
        let mut block: Vec<u8> = self.buffer.drain(..end + 2).collect();
        block.truncate(end);
        self.scanned = 0;
        Some(block)
    }

    fn finish(&mut self) -> Vec<u8> {
        self.scanned = 0;
        std::mem::take(&mut self.buffer)
    }
}

/// Parse one event block.  Blocks with neither data nor an event name
/// (comments, keep-alives) yield `None`.
fn parse_block(block: &[u8]) -> Result<Option<SseEvent>> {
    let text = std::str::from_utf8(block)?;
    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => match data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            "event" => event = Some(value.to_string()),
            _ => {}
        }
    }

    if event.is_none() && data.is_none() {
        return Ok(None);
    }
    Ok(Some(SseEvent {
        event,
        data: data.unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Send + Unpin + 'static {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::from_static(part)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&'static [u8]]) -> Vec<Result<SseEvent>> {
        process_sse(chunks(parts)).collect().await
    }

    fn data(event: &Result<SseEvent>) -> &str {
        &event.as_ref().unwrap().data
    }

    #[tokio::test]
    async fn parse_single_event() {
        let events = collect(&[b"data: {\"content\":\"Hi\"}\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(data(&events[0]), "{\"content\":\"Hi\"}");
    }

    #[tokio::test]
    async fn parse_multiple_events() {
        let events = collect(&[b"data: a\n\ndata: b\n\ndata: [DONE]\n\n"]).await;
        let data: Vec<&str> = events.iter().map(data).collect();
        assert_eq!(data, vec!["a", "b", "[DONE]"]);
    }

    #[tokio::test]
    async fn handle_split_event() {
        let events = collect(&[b"data: hel", b"lo\n", b"\ndata: world\n\n"]).await;
        let data: Vec<&str> = events.iter().map(data).collect();
        assert_eq!(data, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn handle_split_utf8_sequence() {
        // "é" is 0xC3 0xA9; split it across chunks.
        let events = collect(&[b"data: caf\xC3", b"\xA9\n\n"]).await;
        assert_eq!(data(&events[0]), "café");
    }

    #[tokio::test]
    async fn event_names_and_multiline_data() {
        let events = collect(&[b"event: message\ndata: one\ndata: two\n\n"]).await;
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.event.as_deref(), Some("message"));
        assert_eq!(event.data, "one\ntwo");
    }

    #[tokio::test]
    async fn comments_and_keepalives_are_skipped() {
        let events = collect(&[b": keep-alive\n\nid: 7\n\ndata: x\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(data(&events[0]), "x");
    }

    #[tokio::test]
    async fn crlf_framing() {
        let events = collect(&[b"data: a\r\n\r\ndata: b\r\n\r\n"]).await;
        let data: Vec<&str> = events.iter().map(data).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line() {
        let events = collect(&[b"data: a\n\ndata: b"]).await;
        let data: Vec<&str> = events.iter().map(data).collect();
        assert_eq!(data, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_error() {
        let events = collect(&[b"data: \xFF\xFE\n\ndata: ok\n\n"]).await;
        assert!(events[0].is_err());
        assert_eq!(data(&events[1]), "ok");
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let parts = stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: b\n\n")),
        ]);
        let events: Vec<_> = process_sse(parts).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(data(&events[0]), "a");
        assert!(events[1].as_ref().unwrap_err().is_streaming());
    }

    #[tokio::test]
    async fn byte_at_a_time_delivery() {
        let wire = b"data: one\n\n: ping\n\ndata: two\n\n";
        let parts = stream::iter(
            wire.iter()
                .map(|b| Ok::<_, io::Error>(Bytes::copy_from_slice(&[*b])))
                .collect::<Vec<_>>(),
        );
        let events: Vec<_> = process_sse(parts).collect().await;
        let data: Vec<&str> = events.iter().map(data).collect();
        assert_eq!(data, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn oversized_event_ends_stream() {
        let mut head = b"data: ".to_vec();
        head.resize(MAX_EVENT_BYTES + 1, b'x');
        let parts = stream::iter(vec![
            Ok::<_, io::Error>(Bytes::from_static(b"data: a\n\n")),
            Ok(Bytes::from(head)),
            Ok(Bytes::from_static(b"\n\ndata: b\n\n")),
        ]);
        let events: Vec<_> = process_sse(parts).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(data(&events[0]), "a");
        assert!(events[1].as_ref().unwrap_err().is_streaming());
    }

    #[tokio::test]
    async fn large_event_within_limit() {
        let mut body = b"data: ".to_vec();
        body.resize(MAX_EVENT_BYTES - 2, b'y');
        body.extend_from_slice(b"\n\n");
        let parts = stream::iter(
            body.chunks(4096)
                .map(|c| Ok::<_, io::Error>(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        );
        let events: Vec<_> = process_sse(parts).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(data(&events[0]).len(), MAX_EVENT_BYTES - 8);
    }
}
