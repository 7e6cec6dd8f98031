//! Live-shell execution tool.
//!
//! Unlike [`BashTool`], commands run inside the user's actual shell process
//! via the PTY executor, so aliases, shell functions, activated virtualenvs
//! and `cd` all behave exactly as they would typed at the prompt, and state
//! changes persist after the call.
//!
//! [`BashTool`]: super::BashTool

use crate::agent::tool::Tool;
use crate::confirm::ConfirmationGate;
use crate::context::CwdTracker;
use crate::executor::PtyExecutor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct RunInShellTool {
    executor: Arc<PtyExecutor>,
    gate: Arc<dyn ConfirmationGate>,
    cwd: Arc<Mutex<CwdTracker>>,
}

impl RunInShellTool {
    pub fn new(
        executor: Arc<PtyExecutor>,
        gate: Arc<dyn ConfirmationGate>,
        cwd: Arc<Mutex<CwdTracker>>,
    ) -> Self {
        RunInShellTool {
            executor,
            gate,
            cwd,
        }
    }
}

#[async_trait]
impl Tool for RunInShellTool {
    fn name(&self) -> &str {
        "run_in_shell"
    }

    fn description(&self) -> &str {
        "Run a command inside the user's live shell session. Aliases, \
         environment variables, virtualenvs and the current directory all \
         apply, and changes like cd or export persist. Prefer this over \
         bash when the user's shell state matters."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to run in the user's shell",
                },
            },
            "required": ["command"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .context("missing 'command' argument")?;

        let cwd = self.cwd.lock().display();
        let summary = format!("Run in your shell (cwd {})", cwd);
        if !self.gate.confirm(&summary, command).await {
            return Ok("Command execution cancelled by user.".to_string());
        }

        let outcome = self.executor.run(command).await?;
        if outcome.timed_out {
            return Ok(outcome.output);
        }
        if outcome.output.is_empty() {
            return Ok(format!("(command exited with code {})", outcome.exit_code));
        }
        if outcome.exit_code != 0 {
            return Ok(format!(
                "{}\n(exit code {})",
                outcome.output, outcome.exit_code
            ));
        }
        Ok(outcome.output)
    }
}
