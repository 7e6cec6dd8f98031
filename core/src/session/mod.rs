//! Conversation history for one overlay session.
//!
//! The message list is append-only during a turn; nothing ever reorders it.
//! Terminal context is injected as a dedicated system message that gets
//! replaced (not appended) before each turn so stale context does not pile up.

use crate::llm::{ChatMessage, MessageRole, ToolCallSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const CONTEXT_PREFIX: &str = "Recent terminal output:\n";

/// One conversation with its metadata. Serialized as a whole by the storage
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: Option<String>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    /// Index of the terminal-context system message, if one was injected.
    #[serde(default)]
    context_index: Option<usize>,
}

impl Session {
    pub fn new(model: impl Into<String>, system_prompt: &str) -> Self {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4().simple().to_string()[..12].to_string(),
            title: None,
            model: model.into(),
            created_at: now,
            updated_at: now,
            messages: vec![ChatMessage::system(system_prompt)],
            context_index: None,
        }
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        let content = content.into();
        if self.title.is_none() {
            self.title = Some(content.chars().take(80).collect());
        }
        self.push(ChatMessage::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    pub fn add_assistant_tool_calls(&mut self, content: Option<String>, calls: Vec<ToolCallSpec>) {
        self.push(ChatMessage::assistant_tool_calls(content, calls));
    }

    pub fn add_tool_result(&mut self, call_id: &str, result: impl Into<String>) {
        self.push(ChatMessage::tool_result(call_id, result));
    }

    /// Install or replace the terminal-context system message. Replacement
    /// keeps message ordering stable across turns.
    pub fn set_shell_context(&mut self, context: &str) {
        let content = format!("{}{}", CONTEXT_PREFIX, context);
        match self.context_index {
            Some(i) if i < self.messages.len() => {
                self.messages[i] = ChatMessage::system(content);
            }
            _ => {
                self.messages.push(ChatMessage::system(content));
                self.context_index = Some(self.messages.len() - 1);
            }
        }
        self.updated_at = Utc::now();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages a user would count as conversation (no system).
    pub fn visible_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .count()
    }

    fn push(&mut self, msg: ChatMessage) {
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::FunctionCall;

    fn call(id: &str) -> ToolCallSpec {
        ToolCallSpec {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: "bash".to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    #[test]
    fn test_title_from_first_user_message() {
        let mut session = Session::new("m", "sys");
        session.add_user("how do I untar this archive?");
        session.add_user("second question");
        assert_eq!(
            session.title.as_deref(),
            Some("how do I untar this archive?")
        );
    }

    #[test]
    fn test_messages_are_append_only_in_order() {
        let mut session = Session::new("m", "sys");
        session.add_user("q");
        session.add_assistant_tool_calls(Some("running".into()), vec![call("c1")]);
        session.add_tool_result("c1", "output");
        session.add_assistant("done");

        let roles: Vec<_> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant,
            ]
        );
    }

    #[test]
    fn test_shell_context_replaced_not_appended() {
        let mut session = Session::new("m", "sys");
        session.add_user("q");
        session.set_shell_context("$ ls\nfoo");
        let len_after_first = session.messages().len();
        session.set_shell_context("$ ls\nfoo bar");
        assert_eq!(session.messages().len(), len_after_first);
        let ctx = session
            .messages()
            .iter()
            .filter(|m| {
                m.role == MessageRole::System
                    && m.content.as_deref().unwrap_or("").contains("foo bar")
            })
            .count();
        assert_eq!(ctx, 1);
    }

    #[test]
    fn test_visible_count_skips_system() {
        let mut session = Session::new("m", "sys");
        session.add_user("q");
        session.add_assistant("a");
        session.set_shell_context("ctx");
        assert_eq!(session.visible_message_count(), 2);
    }
}
