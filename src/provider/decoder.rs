//! Incremental decoder for streamed chat responses.
//!
//! Network chunks are appended to a byte buffer and split on newlines, so a
//! record is only decoded once it is complete. The first non-empty line fixes
//! the framing (see [`WireFormat`]); every decoded record is normalized into a
//! [`StreamDelta`] regardless of which backend produced it.

use std::collections::BTreeMap;

use memchr::memchr;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::delta::{FinishReason, StreamDelta};
use super::kind::WireFormat;
use crate::error::ChatError;
use crate::message::{normalize_arguments, ArgumentEncoding, Role, ToolCall};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    format: Option<WireFormat>,
    /// `data:` lines of the SSE block being assembled.
    event_data: Vec<String>,
    fragments: ToolCallFragments,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the terminal record (`done` or `[DONE]`) has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one network chunk, appending every delta it completed to `out`.
    ///
    /// # Errors
    ///
    /// Returns the first parse or protocol error. Deltas completed before the
    /// failing record are already in `out`, and the decoder stops there.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        if self.finished {
            return Ok(());
        }
        self.buffer.extend_from_slice(chunk);
        let result = self.drain_lines(out);
        if result.is_err() {
            self.stop();
        }
        result
    }

    /// Flush whatever is left once the body has ended.
    pub fn finish(&mut self, out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        let result = self.flush(out);
        self.stop();
        result
    }

    fn drain_lines(&mut self, out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        while let Some(newline) = memchr(b'\n', &self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = decode_line(&raw[..newline])?;
            self.handle_line(line, out)?;
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        if self.finished {
            return Ok(());
        }
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = decode_line(&raw)?;
            self.handle_line(line, out)?;
        }
        if !self.finished && self.format == Some(WireFormat::Sse) {
            self.dispatch_event(out)?;
        }
        if !self.finished {
            let calls = self.fragments.drain();
            if !calls.is_empty() {
                out.push(StreamDelta::tool_calls(calls));
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.finished = true;
        self.buffer.clear();
        self.event_data.clear();
    }

    fn handle_line(&mut self, line: &str, out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        let format = match self.format {
            Some(format) => format,
            None if line.trim().is_empty() => return Ok(()),
            None => {
                let format = WireFormat::detect(line);
                debug!(format = ?format, "Detected stream format");
                self.format = Some(format);
                format
            }
        };

        match format {
            WireFormat::Ndjson => {
                let record = line.trim();
                if record.is_empty() {
                    return Ok(());
                }
                self.handle_record(record, out)
            }
            WireFormat::Sse => {
                if line.is_empty() {
                    return self.dispatch_event(out);
                }
                if let Some(payload) = line.strip_prefix("data:") {
                    let payload = payload.strip_prefix(' ').unwrap_or(payload);
                    self.event_data.push(payload.to_string());
                } else {
                    trace!(line, "Skipping SSE field");
                }
                Ok(())
            }
        }
    }

    fn dispatch_event(&mut self, out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        if self.event_data.is_empty() {
            return Ok(());
        }
        let data = self.event_data.join("\n");
        self.event_data.clear();

        let data = data.trim();
        if data.is_empty() {
            return Ok(());
        }
        if data == DONE_SENTINEL {
            self.finished = true;
            out.push(StreamDelta {
                tool_calls: self.fragments.drain(),
                done: true,
                ..StreamDelta::default()
            });
            return Ok(());
        }
        self.handle_record(data, out)
    }

    fn handle_record(&mut self, record: &str, out: &mut Vec<StreamDelta>) -> Result<(), ChatError> {
        let value: Value =
            serde_json::from_str(record).map_err(|err| ChatError::parse(err, record))?;
        if !value.is_object() {
            return Err(ChatError::parse("record is not a JSON object", record));
        }
        if value.get("error").is_some_and(|err| !err.is_null()) {
            return Err(ChatError::Protocol {
                status: None,
                body: record.to_string(),
            });
        }

        let delta = match value.get("choices") {
            Some(choices) => self.normalize_choice(choices),
            None => normalize_message(&value, record)?,
        };
        if delta.done {
            self.finished = true;
        }
        if !delta.is_empty() {
            trace!(?delta, "Decoded delta");
            out.push(delta);
        }
        Ok(())
    }

    /// OpenAI-compatible `choices[0].delta` records.
    fn normalize_choice(&mut self, choices: &Value) -> StreamDelta {
        let mut delta = StreamDelta::default();
        let Some(choice) = choices.as_array().and_then(|c| c.first()) else {
            return delta;
        };

        if let Some(body) = choice.get("delta").or_else(|| choice.get("message")) {
            delta.role = parse_role(body.get("role"));
            delta.content = non_empty_str(body.get("content"));
            delta.reasoning = first_non_empty(body, &["reasoning_content", "reasoning", "thinking"]);
            if let Some(fragments) = body.get("tool_calls").and_then(Value::as_array) {
                for (position, fragment) in fragments.iter().enumerate() {
                    self.fragments.push(position, fragment);
                }
            }
        }

        if let Some(reason) = non_empty_str(choice.get("finish_reason")) {
            delta.tool_calls = self.fragments.drain();
            delta.finish_reason = Some(FinishReason::parse(&reason));
        }
        delta
    }
}

/// Ollama `{message, done, done_reason}` records.
fn normalize_message(value: &Value, record: &str) -> Result<StreamDelta, ChatError> {
    let mut delta = StreamDelta::default();
    if let Some(message) = value.get("message") {
        delta.role = parse_role(message.get("role"));
        delta.content = non_empty_str(message.get("content"));
        delta.reasoning = first_non_empty(message, &["thinking", "reasoning", "reasoning_content"]);
        if let Some(calls) = message.get("tool_calls").filter(|c| !c.is_null()) {
            delta.tool_calls = serde_json::from_value::<Vec<ToolCall>>(calls.clone())
                .map_err(|err| ChatError::parse(err, record))?;
        }
    }

    delta.done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
    delta.finish_reason = non_empty_str(value.get("done_reason")).map(|r| FinishReason::parse(&r));
    if delta.done && delta.finish_reason.is_none() {
        delta.finish_reason = Some(FinishReason::Stop);
    }
    Ok(delta)
}

fn decode_line(raw: &[u8]) -> Result<&str, ChatError> {
    let line = std::str::from_utf8(raw)
        .map_err(|err| ChatError::parse(err, String::from_utf8_lossy(raw)))?;
    Ok(line.strip_suffix('\r').unwrap_or(line))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_non_empty(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty_str(body.get(*key)))
}

fn parse_role(value: Option<&Value>) -> Option<Role> {
    match value.and_then(Value::as_str)? {
        "assistant" => Some(Role::Assistant),
        "user" => Some(Role::User),
        "system" => Some(Role::System),
        "tool" => Some(Role::Tool),
        _ => None,
    }
}

/// Tool calls streamed as fragments keyed by `index`.
#[derive(Debug, Default)]
struct ToolCallFragments {
    partial: BTreeMap<u64, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallFragments {
    fn push(&mut self, position: usize, fragment: &Value) {
        let index = fragment
            .get("index")
            .and_then(Value::as_u64)
            .unwrap_or(position as u64);
        let entry = self.partial.entry(index).or_default();

        if let Some(id) = non_empty_str(fragment.get("id")) {
            entry.id = Some(id);
        }
        if let Some(function) = fragment.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                entry.name.push_str(name);
            }
            match function.get("arguments") {
                Some(Value::String(piece)) => entry.arguments.push_str(piece),
                Some(Value::Null) | None => {}
                Some(whole) => entry.arguments = whole.to_string(),
            }
        }
    }

    /// Completed calls in index order.
    fn drain(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.partial)
            .into_iter()
            .filter_map(|(index, call)| {
                if call.name.is_empty() {
                    warn!(index, "Dropping tool call without a name");
                    return None;
                }
                Some(ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments: normalize_arguments(Value::String(call.arguments)),
                    encoding: ArgumentEncoding::String,
                })
            })
            .collect()
    }
}
