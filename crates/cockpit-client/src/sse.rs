//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers partial
//! lines and returns every message completed by the chunk. Only `\n` and
//! `\r\n` line endings are recognised.

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseMessage {
    /// `event:` field, `None` when the server did not name the event.
    pub event: Option<String>,
    pub data: String,
    /// Last `id:` seen on the connection at dispatch time.
    pub id: Option<String>,
}

impl SseMessage {
    /// `true` for unnamed events and events explicitly named `message`,
    /// i.e. the ones a browser would hand to `onmessage`.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the messages it completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(msg) = self.process_line(&line) {
                out.push(msg);
            }
        }
        out
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_owned()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_owned()),
            // `retry` and unknown fields carry nothing we act on.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseMessage {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Vec<SseMessage> {
        SseDecoder::new().feed(input.as_bytes())
    }

    #[test]
    fn single_data_message() {
        let msgs = decode("data: {\"a\":1}\n\n");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, "{\"a\":1}");
        assert!(msgs[0].is_message());
    }

    #[test]
    fn multiple_data_lines_are_joined_with_newline() {
        let msgs = decode("data: first\ndata: second\n\n");
        assert_eq!(msgs[0].data, "first\nsecond");
    }

    #[test]
    fn comments_and_keepalives_are_ignored() {
        let msgs = decode(": keep-alive\n\n:\n\ndata: x\n\n");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, "x");
    }

    #[test]
    fn message_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"da").is_empty());
        assert!(dec.feed(b"ta: hel").is_empty());
        assert!(dec.feed(b"lo\n").is_empty());
        let msgs = dec.feed(b"\ndata: next\n\n");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].data, "hello");
        assert_eq!(msgs[1].data, "next");
    }

    #[test]
    fn crlf_line_endings() {
        let msgs = decode("event: update\r\ndata: y\r\n\r\n");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event.as_deref(), Some("update"));
        assert_eq!(msgs[0].data, "y");
        assert!(!msgs[0].is_message());
    }

    #[test]
    fn value_without_space_after_colon() {
        let msgs = decode("data:tight\n\n");
        assert_eq!(msgs[0].data, "tight");
    }

    #[test]
    fn event_without_data_is_not_dispatched() {
        let msgs = decode("event: ping\n\ndata: z\n\n");
        assert_eq!(msgs.len(), 1);
        // The event name from the dataless block must not leak forward.
        assert_eq!(msgs[0].event, None);
    }

    #[test]
    fn last_event_id_persists() {
        let msgs = decode("id: 7\ndata: a\n\ndata: b\n\n");
        assert_eq!(msgs[0].id.as_deref(), Some("7"));
        assert_eq!(msgs[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn incomplete_trailing_message_is_held() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: pending\n").is_empty());
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let bytes = "data: héllo\n\n".as_bytes();
        let mut dec = SseDecoder::new();
        assert!(dec.feed(&bytes[..8]).is_empty());
        let msgs = dec.feed(&bytes[8..]);
        assert_eq!(msgs[0].data, "héllo");
    }
}
