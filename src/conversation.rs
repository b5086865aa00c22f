//! The in-memory conversation log.
//!
//! The first message is always the system prompt. Consecutive additions with
//! the same role are merged by concatenation, so streamed fragments collapse
//! into one message per speaker turn.

use anyhow::Result;

use crate::message::{Message, Role, ToolCall};
use crate::mode::CapabilityMode;

#[derive(Debug, Clone)]
pub struct Conversation {
    base_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let base_prompt = system_prompt.into();
        Self {
            messages: vec![Message::system(base_prompt.clone())],
            base_prompt,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    /// Append `content`, merging into the last message when the role matches.
    /// Empty content is ignored.
    pub fn add(&mut self, role: Role, content: &str) {
        if content.is_empty() {
            return;
        }
        match self.messages.last_mut() {
            Some(last) if last.role == role => last.content.push_str(content),
            _ => self.messages.push(Message::new(role, content)),
        }
    }

    /// Record tool calls on the current assistant message, opening one if
    /// the last message belongs to someone else.
    pub fn add_tool_calls(&mut self, calls: &[ToolCall]) {
        if calls.is_empty() {
            return;
        }
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.tool_calls.extend_from_slice(calls)
            }
            _ => {
                let mut message = Message::assistant("");
                message.tool_calls = calls.to_vec();
                self.messages.push(message);
            }
        }
    }

    /// Append one tool result. Output answering an identified call gets its
    /// own message carrying that id; anonymous output merges into a trailing
    /// tool message, one line per result.
    pub fn add_tool_result(&mut self, call_id: Option<&str>, content: &str) {
        if let Some(id) = call_id {
            let mut message = Message::new(Role::Tool, content);
            message.tool_call_id = Some(id.to_string());
            self.messages.push(message);
            return;
        }
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Tool && last.tool_call_id.is_none() => {
                last.content.push('\n');
                last.content.push_str(content);
            }
            _ => self.messages.push(Message::new(Role::Tool, content)),
        }
    }

    /// Drop everything but the system message.
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    /// The log as sent for `mode`: identical except for the system message,
    /// which carries the mode-specific prompt.
    pub fn history_for(&self, mode: &CapabilityMode) -> Vec<Message> {
        let mut history = self.messages.clone();
        if let Some(first) = history.first_mut() {
            first.content = system_prompt_for(&self.base_prompt, mode);
        }
        history
    }

    /// Pretty JSON of [`Conversation::history_for`].
    pub fn dump(&self, mode: &CapabilityMode) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.history_for(mode))?)
    }
}

fn system_prompt_for(base: &str, mode: &CapabilityMode) -> String {
    match mode.prompt_line() {
        Some(line) => format!("{base}\n\n{line}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Capability;
    use serde_json::json;

    #[test]
    fn starts_with_system_message() {
        let conv = Conversation::new("be brief");
        assert_eq!(conv.messages(), &[Message::system("be brief")]);
    }

    #[test]
    fn same_role_additions_merge() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::Assistant, "Hel");
        conv.add(Role::Assistant, "lo");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].content, "Hello");
    }

    #[test]
    fn role_change_starts_new_message() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::User, "hi");
        conv.add(Role::Assistant, "hello");
        conv.add(Role::User, "again");
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn empty_content_is_ignored() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::User, "");
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn clear_keeps_only_system() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::User, "hi");
        conv.add(Role::Assistant, "hello");
        conv.clear();
        assert_eq!(conv.messages(), &[Message::system("sys")]);
    }

    #[test]
    fn tool_calls_attach_to_assistant_message() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::Assistant, "let me look");
        conv.add_tool_calls(&[ToolCall::new("list", json!({"pattern": "*"}))]);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].tool_calls.len(), 1);

        conv.add(Role::Tool, "a.txt");
        conv.add_tool_calls(&[ToolCall::new("read", json!({"path": "a.txt"}))]);
        assert_eq!(conv.len(), 4);
        assert_eq!(conv.messages()[3].role, Role::Assistant);
        assert_eq!(conv.messages()[3].content, "");
    }

    #[test]
    fn anonymous_tool_results_merge_and_identified_ones_stand_alone() {
        let mut conv = Conversation::new("sys");
        conv.add_tool_result(None, "first");
        conv.add_tool_result(None, "second");
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].content, "first\nsecond");

        conv.add_tool_result(Some("call_a"), "a");
        conv.add_tool_result(Some("call_b"), "b");
        conv.add_tool_result(None, "c");
        let ids: Vec<Option<&str>> = conv.messages()[2..]
            .iter()
            .map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(ids, vec![Some("call_a"), Some("call_b"), None]);
        assert_eq!(conv.messages()[4].content, "c");
    }

    #[test]
    fn history_for_mode_swaps_prompt_without_mutation() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::User, "hi");
        let read_write = CapabilityMode::new([Capability::Read, Capability::Write]);
        let write_read = CapabilityMode::new([Capability::Write, Capability::Read]);

        let history = conv.history_for(&read_write);
        assert!(history[0].content.starts_with("sys\n\n"));
        assert_eq!(history, conv.history_for(&write_read));
        assert_ne!(history[0], conv.history_for(&CapabilityMode::all())[0]);
        assert_eq!(history[1], Message::new(Role::User, "hi"));
        assert_eq!(conv.messages()[0].content, "sys");
    }

    #[test]
    fn dump_is_json_array() {
        let mut conv = Conversation::new("sys");
        conv.add(Role::User, "hi");
        let dumped: serde_json::Value =
            serde_json::from_str(&conv.dump(&CapabilityMode::default()).unwrap()).unwrap();
        assert_eq!(
            dumped,
            json!([{"role": "system", "content": "sys"}, {"role": "user", "content": "hi"}])
        );
    }
}
