//! Rendering collaborator.
//!
//! The engine is agnostic to presentation: components emit [`UiEvent`]s and
//! a [`Renderer`] decides how to show them. The default implementation writes
//! styled text with `console`.

use console::style;
use std::io::Write;

/// Structured display events emitted by the engine.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// A chunk of streamed assistant text
    AssistantDelta(String),
    /// The assistant finished its final text for this turn
    AssistantDone,
    /// The model requested a tool call
    ToolCallStart { name: String, args: String },
    /// A tool finished and produced a result
    ToolResult(String),
    /// A non-fatal problem worth surfacing (skipped fragment, retryable error)
    Warning(String),
    /// An error, rendered distinctly from normal content
    Error(String),
    /// The proxy switched between shell and AI mode
    ModeChanged { ai: bool },
}

pub trait Renderer: Send + Sync {
    fn emit(&self, event: UiEvent);
}

/// Writes events to the real terminal with `console` styling. Used while the
/// terminal is in cooked mode (agent turns).
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    pub fn new() -> Self {
        ConsoleRenderer
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for ConsoleRenderer {
    fn emit(&self, event: UiEvent) {
        match event {
            UiEvent::AssistantDelta(text) => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            UiEvent::AssistantDone => {
                println!();
            }
            UiEvent::ToolCallStart { name, args } => {
                let args = if args.chars().count() > 200 {
                    format!("{}...", args.chars().take(200).collect::<String>())
                } else {
                    args
                };
                println!(
                    "\n{} {} {}",
                    style("tool:").cyan().bold(),
                    style(name).bold(),
                    style(args).dim()
                );
            }
            UiEvent::ToolResult(result) => {
                let preview: String = result.lines().take(12).collect::<Vec<_>>().join("\n");
                let truncated = result.lines().count() > 12;
                println!("{}", style(preview).dim());
                if truncated {
                    println!("{}", style("  ...").dim());
                }
            }
            UiEvent::Warning(msg) => {
                println!("{} {}", style("warning:").yellow().bold(), msg);
            }
            UiEvent::Error(msg) => {
                println!("{} {}", style("error:").red().bold(), msg);
            }
            UiEvent::ModeChanged { ai } => {
                if ai {
                    println!(
                        "{}",
                        style("-- AI mode (Esc to return to shell) --").magenta().dim()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Collects emitted events for assertions.
    #[derive(Default)]
    pub struct RecordingRenderer {
        pub events: Mutex<Vec<UiEvent>>,
    }

    impl Renderer for RecordingRenderer {
        fn emit(&self, event: UiEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
