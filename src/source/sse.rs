//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks from the HTTP body; [`SseDecoder::feed`]
//! buffers partial lines and returns every event completed by the chunk.
//! Pure and I/O free so the framing rules can be tested directly.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// The `event:` field, or `"message"` when the server sent none.
    pub name: String,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
    /// Last `id:` seen on this connection.
    pub id: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of the body, returning the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(line.trim_start_matches('\u{feff}')) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<ServerEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            // comment / keep-alive
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // `retry` and unknown fields are ignored; reconnect delay is fixed.
            _ => {}
        }
        None
    }

    /// Blank line: emit whatever has accumulated.  Unlike a browser we also
    /// dispatch a named event that carried no `data:` line, since pure
    /// trigger signals are allowed to be empty.
    fn dispatch(&mut self) -> Option<ServerEvent> {
        let name = self.event.take();
        let data = std::mem::take(&mut self.data);
        if name.is_none() && data.is_empty() {
            return None;
        }

        Some(ServerEvent {
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_event() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: news_update\ndata: {}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "news_update");
        assert_eq!(events[0].data, "{}");
        assert!(events[0].id.is_none());
    }

    #[test]
    fn unnamed_event_defaults_to_message() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: hello\n\n");
        assert_eq!(events[0].name, "message");
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn named_event_without_data_still_dispatches() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: news_update\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn event_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"eve").is_empty());
        assert!(dec.feed(b"nt: news_up").is_empty());
        assert!(dec.feed(b"date\r\ndata: a\r\n").is_empty());
        let events = dec.feed(b"\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "news_update");
        assert_eq!(events[0].data, "a");
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"data: one\ndata:two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b": keep-alive\n\n\n").is_empty());
    }

    #[test]
    fn several_events_in_one_chunk() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"event: a\ndata: 1\n\nevent: b\ndata: 2\n\n");
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn id_sticks_to_later_events() {
        let mut dec = SseDecoder::new();
        let events = dec.feed(b"id: 7\ndata: x\n\ndata: y\n\n");
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[1].id.as_deref(), Some("7"));
    }

    #[test]
    fn retry_field_is_ignored() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"retry: 10000\n\n").is_empty());
    }
}
