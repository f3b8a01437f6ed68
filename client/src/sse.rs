//! Server-sent event framing.
//!
//! Frames are separated by a blank line (`\n\n` or `\r\n\r\n`). Inside a frame
//! each line is `field: value`; a line starting with `:` is a comment.

use std::time::Duration;

/// Upper bound on an incomplete frame held in memory.
pub(crate) const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Event name used when a frame has no `event:` field.
pub(crate) const DEFAULT_EVENT_NAME: &str = "message";

/// Fields of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub(crate) event: Option<String>,
    /// `data:` lines joined with `\n`; `None` when the frame had none.
    pub(crate) data: Option<String>,
    pub(crate) id: Option<String>,
    pub(crate) retry: Option<Duration>,
}

fn find_sse_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

pub(crate) fn drain_next_sse_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_sse_event_boundary(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(event)
}

pub(crate) fn parse_sse_frame(frame: &str) -> SseFrame {
    let mut parsed = SseFrame::default();

    for line in frame.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => parsed.event = Some(value.to_string()),
            "data" => match parsed.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => parsed.data = Some(value.to_string()),
            },
            // An id containing NUL is ignored.
            "id" if !value.contains('\0') => parsed.id = Some(value.to_string()),
            "retry" => {
                if !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(ms) = value.parse::<u64>()
                {
                    parsed.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
    }

    parsed
}

impl SseFrame {
    /// The dispatched event name; empty or missing names become `message`.
    pub(crate) fn event_name(&self) -> &str {
        match self.event.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_EVENT_NAME,
        }
    }
}
