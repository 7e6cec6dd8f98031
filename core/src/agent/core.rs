//! The agent turn loop.
//!
//! One call to [`run_turn`] drives a full user turn: stream the model
//! response, reassemble tool-call fragments, dispatch tools sequentially,
//! append results, and re-prompt until the model answers with plain text.
//! Tool failures become result strings and never end the turn; only
//! transport failures and cancellation do.

use crate::agent::registry::ToolRegistry;
use crate::error::ShellmError;
use crate::llm::{ChatMessage, FunctionCall, ModelClient, StreamEvent, ToolCallSpec};
use crate::render::{Renderer, UiEvent};
use crate::session::Session;
use anyhow::Result;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Run the agent loop until the model produces a response with no tool calls.
///
/// On cancellation, everything appended to the session so far stays (including
/// partial assistant text already rendered) and message ordering is intact.
pub async fn run_turn(
    client: &dyn ModelClient,
    session: &mut Session,
    registry: &ToolRegistry,
    renderer: &dyn Renderer,
    cancel: &CancellationToken,
) -> Result<()> {
    loop {
        let mut stream = client
            .stream_chat(session.messages().to_vec(), registry.to_schema())
            .await?;

        let mut content = String::new();
        let mut pending: BTreeMap<u32, PendingCall> = BTreeMap::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if !content.is_empty() {
                        session.add_assistant(content);
                        renderer.emit(UiEvent::AssistantDone);
                    }
                    return Err(ShellmError::Interrupted.into());
                }
                event = stream.next() => {
                    match event {
                        None | Some(Ok(StreamEvent::Done)) => break,
                        Some(Ok(StreamEvent::Content(delta))) => {
                            content.push_str(&delta);
                            renderer.emit(UiEvent::AssistantDelta(delta));
                        }
                        Some(Ok(StreamEvent::ToolCallDelta { index, id, name, arguments })) => {
                            let call = pending.entry(index).or_default();
                            if let Some(id) = id {
                                call.id = Some(id);
                            }
                            if let Some(name) = name {
                                call.name.push_str(&name);
                            }
                            if let Some(arguments) = arguments {
                                call.arguments.push_str(&arguments);
                            }
                        }
                        Some(Err(e)) => {
                            // Text the user already saw streamed must survive
                            // a disconnect, same as the cancellation path.
                            if !content.is_empty() {
                                session.add_assistant(content);
                                renderer.emit(UiEvent::AssistantDone);
                            }
                            return Err(e);
                        }
                    }
                }
            }
        }

        if !content.is_empty() {
            renderer.emit(UiEvent::AssistantDone);
        }

        if pending.is_empty() {
            if !content.is_empty() {
                session.add_assistant(content);
            }
            return Ok(());
        }

        // BTreeMap iteration gives the model's requested order back.
        let calls: Vec<ToolCallSpec> = pending
            .into_iter()
            .map(|(index, call)| ToolCallSpec {
                id: call.id.unwrap_or_else(|| format!("call_{}", index)),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: call.name,
                    arguments: call.arguments,
                },
            })
            .collect();

        let turn_content = if content.is_empty() {
            None
        } else {
            Some(content)
        };
        session.add_assistant_tool_calls(turn_content, calls.clone());

        for call in &calls {
            let args = parse_arguments(&call.function, renderer);
            renderer.emit(UiEvent::ToolCallStart {
                name: call.function.name.clone(),
                args: args.to_string(),
            });
            let result = registry.execute(&call.function.name, args).await;
            renderer.emit(UiEvent::ToolResult(result.clone()));
            session.add_tool_result(&call.id, result);
        }
    }
}

/// Malformed argument JSON is surfaced as a warning and dispatched as an
/// empty object; the tool decides what missing arguments mean.
fn parse_arguments(function: &FunctionCall, renderer: &dyn Renderer) -> Value {
    if function.arguments.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str(&function.arguments) {
        Ok(value) => value,
        Err(e) => {
            crate::debug_log!(
                "malformed arguments for {}: {}: {}",
                function.name,
                e,
                function.arguments
            );
            renderer.emit(UiEvent::Warning(format!(
                "skipping malformed arguments for {}: {}",
                function.name, e
            )));
            json!({})
        }
    }
}
