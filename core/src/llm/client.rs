//! Streaming LLM client for OpenAI-compatible chat endpoints.
//!
//! The engine consumes the model strictly as an event stream; this module is
//! the only place that knows about HTTP and server-sent events. Malformed
//! `data:` chunks are skipped rather than failing the turn.

use super::chat::{ChatMessage, StreamEvent};
use crate::error::ShellmError;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header::HeaderMap, Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use std::pin::Pin;
use std::time::Duration;

/// A stream of incremental model events, terminated by [`StreamEvent::Done`].
pub type EventStream = Pin<Box<dyn futures::Stream<Item = Result<StreamEvent>> + Send>>;

/// Seam between the agent loop and the transport. Tests substitute a scripted
/// implementation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<serde_json::Value>,
    ) -> Result<EventStream>;
}

/// Connection parameters for the HTTP client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
}

/// OpenAI-compatible streaming client over reqwest.
pub struct HttpClient {
    config: LlmConfig,
    http: ReqwestClient,
}

impl HttpClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(HttpClient { config, http })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "application/json".parse().unwrap());
        if let Some(key) = &self.config.api_key {
            if !key.is_empty() {
                if let Ok(value) = format!("Bearer {}", key).parse() {
                    headers.insert("Authorization", value);
                }
            }
        }
        headers
    }
}

#[async_trait]
impl ModelClient for HttpClient {
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<serde_json::Value>,
    ) -> Result<EventStream> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(tools) = tools {
            payload["tools"] = tools;
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = serde_json::json!(temp);
        }

        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    anyhow::Error::new(ShellmError::Connection {
                        base_url: self.config.base_url.clone(),
                        message: e.to_string(),
                    })
                } else {
                    anyhow::Error::new(e)
                }
            })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                return Err(ShellmError::Unauthorized {
                    message: "check your API key".to_string(),
                }
                .into());
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(ShellmError::Provider {
                    status: status.as_u16(),
                    message: extract_error_message(&body),
                }
                .into());
            }
        }

        let mut body = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut buffer = String::new();

            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| ShellmError::StreamDisconnected {
                    message: e.to_string(),
                })?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE lines
                while let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].trim_end_matches('\r').to_string();
                    buffer.drain(..newline_pos + 1);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        yield StreamEvent::Done;
                        return;
                    }

                    let parsed: StreamChunk = match serde_json::from_str(data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            // Skip malformed chunks from the model
                            crate::debug_log!("skipping malformed stream chunk: {}", e);
                            continue;
                        }
                    };

                    let Some(choice) = parsed.choices.into_iter().next() else {
                        continue;
                    };
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield StreamEvent::Content(content);
                        }
                    }
                    for tc in choice.delta.tool_calls.unwrap_or_default() {
                        let (name, arguments) = match tc.function {
                            Some(f) => (f.name, f.arguments),
                            None => (None, None),
                        };
                        yield StreamEvent::ToolCallDelta {
                            index: tc.index,
                            id: tc.id,
                            name,
                            arguments,
                        };
                    }
                }
            }

            yield StreamEvent::Done;
        };

        Ok(Box::pin(stream))
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "unknown error".to_string()
            } else {
                body.chars().take(200).collect()
            }
        })
}

// Wire types for streamed chunks

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Deserialize)]
struct ToolCallChunk {
    index: u32,
    id: Option<String>,
    function: Option<FunctionChunk>,
}

#[derive(Deserialize)]
struct FunctionChunk {
    name: Option<String>,
    arguments: Option<String>,
}
