//! Subprocess shell tool.
//!
//! Runs a command in a fresh `sh -c` subprocess, unlike [`RunInShellTool`]
//! which injects into the user's live shell. Commands run in their own
//! process group so a timeout can kill the whole tree, not just the
//! immediate child.
//!
//! [`RunInShellTool`]: super::RunInShellTool

use crate::agent::tool::Tool;
use crate::confirm::ConfirmationGate;
use crate::context::CwdTracker;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

const OUTPUT_CAP: usize = 10_000;

pub struct BashTool {
    gate: Arc<dyn ConfirmationGate>,
    cwd: Arc<Mutex<CwdTracker>>,
    timeout: Duration,
}

impl BashTool {
    pub fn new(
        gate: Arc<dyn ConfirmationGate>,
        cwd: Arc<Mutex<CwdTracker>>,
        timeout: Duration,
    ) -> Self {
        BashTool { gate, cwd, timeout }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command in a subprocess and return stdout, stderr and \
         exit code. Use for system commands, builds, installations."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute",
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
        let summary = format!("Run command (in {})", cwd);
        if !self.gate.confirm(&summary, command).await {
            return Ok("Command execution cancelled by user.".to_string());
        }

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if cwd != "unknown" {
            cmd.current_dir(&cwd);
        }

        let child = cmd.spawn().context("failed to spawn command")?;
        let pid = child.id();

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.context("failed to collect command output")?;
                Ok(render_result(
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr),
                    output.status.code().unwrap_or(-1),
                    false,
                ))
            }
            Err(_) => {
                // The child future was dropped by the timeout; kill the whole
                // process group so grandchildren do not linger.
                if let Some(pid) = pid {
                    unsafe {
                        libc::killpg(pid as i32, libc::SIGKILL);
                    }
                }
                crate::error_log!(
                    "bash tool timed out after {}s: {}",
                    self.timeout.as_secs(),
                    command
                );
                Ok(render_result("", "", -1, true))
            }
        }
    }
}

fn render_result(stdout: &str, stderr: &str, exit_code: i32, timed_out: bool) -> String {
    json!({
        "stdout": cap(stdout),
        "stderr": cap(stderr),
        "exit_code": exit_code,
        "timed_out": timed_out,
    })
    .to_string()
}

fn cap(text: &str) -> String {
    if text.len() <= OUTPUT_CAP {
        return text.to_string();
    }
    let end = (0..=OUTPUT_CAP)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}\n... (truncated)", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::testing::FixedGate;

    fn tool(gate: FixedGate, timeout: Duration) -> BashTool {
        let cwd = Arc::new(Mutex::new(CwdTracker::new(std::process::id())));
        BashTool::new(Arc::new(gate), cwd, timeout)
    }

    #[tokio::test]
    async fn test_declined_command_does_not_run() {
        let tool = tool(FixedGate::declining(), Duration::from_secs(5));
        let result = tool
            .execute(json!({"command": "echo should-not-run"}))
            .await
            .unwrap();
        assert_eq!(result, "Command execution cancelled by user.");
    }

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_exit_code() {
        let tool = tool(FixedGate::approving(), Duration::from_secs(10));
        let result = tool
            .execute(json!({"command": "echo out; echo err >&2; exit 3"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert!(parsed["stdout"].as_str().unwrap().contains("out"));
        assert!(parsed["stderr"].as_str().unwrap().contains("err"));
        assert_eq!(parsed["exit_code"], 3);
        assert_eq!(parsed["timed_out"], false);
    }

    #[tokio::test]
    async fn test_timeout_reports_timed_out() {
        let tool = tool(FixedGate::approving(), Duration::from_millis(200));
        let result = tool
            .execute(json!({"command": "sleep 5"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["timed_out"], true);
        assert_eq!(parsed["exit_code"], -1);
    }

    #[tokio::test]
    async fn test_missing_argument_is_error() {
        let tool = tool(FixedGate::approving(), Duration::from_secs(5));
        assert!(tool.execute(json!({})).await.is_err());
    }
}
