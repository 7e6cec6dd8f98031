//! LLM transport: chat message types and the streaming client.

pub mod chat;
pub mod client;

pub use chat::{ChatMessage, FunctionCall, MessageRole, StreamEvent, ToolCallSpec};
pub use client::{EventStream, HttpClient, LlmConfig, ModelClient};
