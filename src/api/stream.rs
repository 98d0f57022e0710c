use crate::logging::emit_sse_parse_error;
use crate::types::{ChatCompletionChunk, ContentBlock, Role, StreamEvent, TransportEvent};
use serde_json::Value;

/// Incremental SSE decoder for Anthropic Messages and OpenAI Chat Completions
/// streams. Frames may be split across chunks at any byte, including inside a
/// multi-byte character.
pub struct StreamParser {
    buffer: Vec<u8>,
    role: Role,
    completed: bool,
}

impl Default for StreamParser {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            role: Role::Assistant,
            completed: false,
        }
    }
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event (`message_stop` or `[DONE]`) has been seen.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<TransportEvent> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = find_frame_end(&self.buffer[start..]) {
            let frame_end = start + end + 2;
            let frame = String::from_utf8_lossy(&self.buffer[start..frame_end]).into_owned();
            self.process_frame(&frame, &mut events);
            start = frame_end;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }

        events
    }

    /// Decodes a trailing frame the server did not terminate with a blank line.
    pub fn finish(&mut self) -> Vec<TransportEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let mut events = Vec::new();
        let frame = String::from_utf8_lossy(&rest);
        if !frame.trim().is_empty() {
            self.process_frame(&frame, &mut events);
        }
        events
    }

    fn process_frame(&mut self, frame: &str, events: &mut Vec<TransportEvent>) {
        let mut event_type = None;
        let mut data_lines = Vec::new();

        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event_type = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }

        if data_lines.is_empty() {
            return;
        }
        let data = data_lines.join("\n");
        let data = data.trim();
        if data == "[DONE]" {
            self.push_complete(events);
            return;
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(error) => {
                emit_sse_parse_error(event_type.as_deref(), data, &error);
                return;
            }
        };

        if value.get("choices").is_some() {
            match serde_json::from_value::<ChatCompletionChunk>(value) {
                Ok(chunk) => self.push_openai_chunk(chunk, events),
                Err(error) => emit_sse_parse_error(event_type.as_deref(), data, &error),
            }
            return;
        }

        match serde_json::from_value::<StreamEvent>(value) {
            Ok(event) => self.push_anthropic_event(event, events),
            Err(error) => emit_sse_parse_error(event_type.as_deref(), data, &error),
        }
    }

    fn push_anthropic_event(&mut self, event: StreamEvent, events: &mut Vec<TransportEvent>) {
        match event {
            StreamEvent::MessageStart { message } => self.role = message.role,
            StreamEvent::ContentBlockStart {
                content_block: ContentBlock::Text { text },
                ..
            } => self.push_text(text, events),
            StreamEvent::ContentBlockDelta { delta, .. } if delta.delta_type == "text_delta" => {
                if let Some(text) = delta.text {
                    self.push_text(text, events);
                }
            }
            StreamEvent::MessageStop => self.push_complete(events),
            StreamEvent::Error { error } => {
                events.push(TransportEvent::Error(format!(
                    "{}: {}",
                    error.error_type, error.message
                )));
            }
            _ => {}
        }
    }

    fn push_openai_chunk(&mut self, chunk: ChatCompletionChunk, events: &mut Vec<TransportEvent>) {
        for choice in chunk.choices {
            if let Some(role) = choice.delta.role.as_deref().and_then(Role::parse) {
                self.role = role;
            }
            if let Some(text) = choice.delta.content {
                self.push_text(text, events);
            }
        }
    }

    fn push_text(&self, text: String, events: &mut Vec<TransportEvent>) {
        if !text.is_empty() {
            events.push(TransportEvent::Delta {
                role: self.role,
                text,
            });
        }
    }

    fn push_complete(&mut self, events: &mut Vec<TransportEvent>) {
        if !self.completed {
            self.completed = true;
            events.push(TransportEvent::Complete);
        }
    }
}

fn find_frame_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|pair| pair == b"\n\n")
}
