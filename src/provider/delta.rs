//! The normalized unit of streamed model output.

use crate::message::{Role, ToolCall};

/// Why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" => FinishReason::Stop,
            "tool_calls" | "tool_use" => FinishReason::ToolCalls,
            "length" | "max_tokens" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => f.write_str("stop"),
            FinishReason::ToolCalls => f.write_str("tool_calls"),
            FinishReason::Length => f.write_str("length"),
            FinishReason::Other(reason) => f.write_str(reason),
        }
    }
}

/// One streamed increment. Empty fields are `None`, never `Some("")`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    pub role: Option<Role>,
    pub content: Option<String>,
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub done: bool,
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self {
            done: true,
            finish_reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn with_finish(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// True when the delta carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.content.is_none()
            && self.reasoning.is_none()
            && self.tool_calls.is_empty()
            && !self.done
            && self.finish_reason.is_none()
    }

    /// Break a multi-facet delta into single-facet pieces, ordered reasoning,
    /// content, tool calls. `done` and the finish reason ride on the last piece.
    pub fn split(self) -> Vec<StreamDelta> {
        let StreamDelta {
            role,
            content,
            reasoning,
            tool_calls,
            done,
            finish_reason,
        } = self;

        let mut pieces = Vec::new();
        if let Some(text) = reasoning {
            pieces.push(StreamDelta::reasoning(text));
        }
        if let Some(text) = content {
            pieces.push(StreamDelta {
                role,
                ..StreamDelta::content(text)
            });
        }
        if !tool_calls.is_empty() {
            pieces.push(StreamDelta::tool_calls(tool_calls));
        }

        match pieces.last_mut() {
            Some(last) => {
                last.done = done;
                last.finish_reason = finish_reason;
            }
            None => pieces.push(StreamDelta {
                role,
                done,
                finish_reason,
                ..StreamDelta::default()
            }),
        }
        pieces
    }
}
