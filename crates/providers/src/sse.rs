//! Shared SSE streaming infrastructure for all HTTP provider handlers.
//!
//! Every SSE vendor follows the same pattern: send the request, buffer body
//! chunks, split on blank lines, extract `data:` payloads, and feed each
//! payload to a provider-specific parser that returns `Vec<Result<StreamEvent>>`.
//!
//! - [`drain_data_lines`] pulls complete `data:` payloads from an SSE buffer
//! - [`sse_stream`] builds an [`ApiStream`] from a request + parser closure

use crate::util::{from_reqwest, send_checked};
use mr_domain::error::Result;
use mr_domain::stream::{ApiStream, StreamEvent};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// SSE events are delimited by a blank line.  Each event block may contain
/// `event:`, `data:`, `id:`, or `retry:` lines.  We only care about
/// `data:` lines.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial event remains for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }

    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2); // remove the \n\n delimiter

        for line in block.lines() {
            let line = line.trim();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Move the longest valid UTF-8 prefix of `pending` into `out`.
///
/// A multi-byte character split across two body chunks stays in `pending`
/// until the rest of it arrives. Bytes that can never form valid UTF-8 are
/// replaced lossily.
pub(crate) fn decode_utf8_prefix(pending: &mut Vec<u8>, out: &mut String) {
    match std::str::from_utf8(pending) {
        Ok(s) => {
            out.push_str(s);
            pending.clear();
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            out.push_str(&String::from_utf8_lossy(&pending[..valid]));
            pending.drain(..valid);
        }
        Err(_) => {
            out.push_str(&String::from_utf8_lossy(pending));
            pending.clear();
        }
    }
}

/// Build an [`ApiStream`] from an SSE request and a provider-specific
/// parser closure.
///
/// The closure receives each `data:` payload string and returns zero or more
/// stream events.  It is `FnMut` (not `Fn`) because some providers
/// (Anthropic) keep state across payloads.
///
/// The stream:
/// 1. Sends the request on first poll; a non-2xx status becomes an error item
/// 2. Buffers incoming chunks and drains complete SSE events
/// 3. Flushes the remaining buffer when the response body closes
/// 4. Ends right after the first error item
pub(crate) fn sse_stream<F>(
    provider: String,
    request: Result<reqwest::RequestBuilder>,
    mut parse_data: F,
) -> ApiStream
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = match send_checked(&provider, request).await {
            Ok(resp) => resp,
            Err(e) => {
                yield Err(e);
                return;
            }
        };
        let mut pending: Vec<u8> = Vec::new();
        let mut buffer = String::new();

        loop {
            let data_lines = match response.chunk().await {
                Ok(Some(bytes)) => {
                    pending.extend_from_slice(&bytes);
                    decode_utf8_prefix(&mut pending, &mut buffer);
                    drain_data_lines(&mut buffer)
                }
                Ok(None) => {
                    // Body closed -- flush any remaining partial event.
                    if !pending.is_empty() {
                        buffer.push_str(&String::from_utf8_lossy(&pending));
                    }
                    if buffer.trim().is_empty() {
                        break;
                    }
                    buffer.push_str("\n\n");
                    let lines = drain_data_lines(&mut buffer);
                    for data in lines {
                        for event in parse_data(&data) {
                            let failed = event.is_err();
                            yield event;
                            if failed {
                                return;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    return;
                }
            };

            for data in data_lines {
                for event in parse_data(&data) {
                    let failed = event.is_err();
                    yield event;
                    if failed {
                        return;
                    }
                }
            }
        }

        tracing::trace!(provider = %provider, "sse stream finished");
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_complete_event() {
        let mut buf = String::from("event: message\ndata: {\"hello\":\"world\"}\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"hello\":\"world\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_events() {
        let mut buf = String::from("data: first\n\ndata: second\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["first", "second"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_partial_event_stays_in_buffer() {
        let mut buf = String::from("data: complete\n\ndata: partial");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(buf, "data: partial");
    }

    #[test]
    fn drain_crlf_delimited_events() {
        let mut buf = String::from("data: one\r\n\r\ndata: two\r\n\r\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["one", "two"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_crlf_split_across_pushes() {
        let mut buf = String::from("data: one\r\n\r");
        assert!(drain_data_lines(&mut buf).is_empty());
        buf.push_str("\ndata: two\r\n\r\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["one", "two"]);
    }

    #[test]
    fn drain_skips_empty_data_lines() {
        let mut buf = String::from("data: \n\n");
        let lines = drain_data_lines(&mut buf);
        assert!(lines.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_ignores_non_data_lines() {
        let mut buf = String::from("event: ping\nid: 42\nretry: 5000\ndata: payload\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["payload"]);
    }

    #[test]
    fn drain_done_sentinel_preserved() {
        let mut buf = String::from("data: [DONE]\n\n");
        assert_eq!(drain_data_lines(&mut buf), vec!["[DONE]"]);
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("data: chunk1");
        assert!(drain_data_lines(&mut buf).is_empty());
        assert_eq!(buf, "data: chunk1");

        buf.push_str("\n\ndata: chunk2\n\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["chunk1", "chunk2"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn utf8_split_character_waits_for_rest() {
        let bytes = "é".as_bytes();
        let mut pending = vec![b'a', bytes[0]];
        let mut out = String::new();
        decode_utf8_prefix(&mut pending, &mut out);
        assert_eq!(out, "a");
        assert_eq!(pending, vec![bytes[0]]);

        pending.push(bytes[1]);
        decode_utf8_prefix(&mut pending, &mut out);
        assert_eq!(out, "aé");
        assert!(pending.is_empty());
    }

    #[test]
    fn utf8_invalid_bytes_are_replaced() {
        let mut pending = vec![b'a', 0xff, b'b'];
        let mut out = String::new();
        decode_utf8_prefix(&mut pending, &mut out);
        assert_eq!(out, "a\u{fffd}b");
        assert!(pending.is_empty());
    }
}
