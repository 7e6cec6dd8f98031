//! In-shell command execution over the live PTY.
//!
//! Commands run inside the user's actual shell process so aliases, functions,
//! environment and cwd all apply, and cd/export persist afterwards. Completion
//! is detected with a marker protocol: the command is wrapped so the shell
//! prints a unique marker line carrying `$?` once it finishes. The echoed
//! wrapper contains the literal `%d`, so only the expanded marker (with real
//! digits) satisfies the completion regex.

use crate::error::ShellmError;
use crate::proxy::pty::PtySession;
use anyhow::Result;
use regex::Regex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

const MARKER_PREFIX: &str = "___SHELLM_DONE_";
const OUTPUT_CAP: usize = 10_000;
const CTRL_C: &[u8] = &[0x03];

/// Slot the reactor copies PTY output into while an execution is in flight.
/// Installed by the executor for the duration of one command, empty otherwise.
#[derive(Clone, Default)]
pub struct OutputTap {
    sender: Arc<Mutex<Option<UnboundedSender<Vec<u8>>>>>,
}

impl OutputTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the reactor for every PTY chunk. Cheap when no tap is set.
    pub fn forward(&self, data: &[u8]) {
        if let Ok(guard) = self.sender.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(data.to_vec());
            }
        }
    }

    fn install(&self, tx: UnboundedSender<Vec<u8>>) {
        if let Ok(mut guard) = self.sender.lock() {
            *guard = Some(tx);
        }
    }

    fn remove(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            *guard = None;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub output: String,
    pub timed_out: bool,
}

pub struct PtyExecutor {
    pty: PtySession,
    tap: OutputTap,
    busy: AtomicBool,
    counter: AtomicU64,
    timeout: Duration,
}

impl PtyExecutor {
    pub fn new(pty: PtySession, tap: OutputTap, timeout: Duration) -> Self {
        PtyExecutor {
            pty,
            tap,
            busy: AtomicBool::new(false),
            counter: AtomicU64::new(0),
            timeout,
        }
    }

    /// Whether an execution is currently in flight. The proxy echoes PTY
    /// output to the real terminal while this holds, so the user watches
    /// agent-run commands live.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run one command to completion in the user's shell.
    ///
    /// Only one execution may be in flight at a time; a second call while one
    /// is pending fails without touching the PTY.
    pub async fn run(&self, command: &str) -> Result<ExecOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ShellmError::ExecutionInFlight.into());
        }
        let result = self.run_inner(command).await;
        self.tap.remove();
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, command: &str) -> Result<ExecOutcome> {
        let count = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let pid = self.pty.child_pid().unwrap_or(0);
        let marker_id = format!("{:x}{:x}", pid, count);
        let marker = format!("{}{}", MARKER_PREFIX, marker_id);
        // (?m) so the marker matches at line starts inside accumulated output.
        let done = Regex::new(&format!(r"(?m)^{}_(\d+)___\s*$", regex::escape(&marker)))
            .map_err(|e| anyhow::anyhow!("marker regex: {}", e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.tap.install(tx);

        let wrapper = format!("{}; printf '\\n{}_%d___\\n' $?\n", command, marker);
        crate::debug_log!("executing in shell: {}", command);
        self.pty.write_all(wrapper.as_bytes())?;

        let mut raw: Vec<u8> = Vec::new();
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let chunk = tokio::time::timeout_at(deadline, rx.recv()).await;
            match chunk {
                Ok(Some(data)) => {
                    raw.extend_from_slice(&data);
                    let text = clean_output(&String::from_utf8_lossy(&raw));
                    if let Some(caps) = done.captures(&text) {
                        let exit_code = caps
                            .get(1)
                            .and_then(|m| m.as_str().parse::<i32>().ok())
                            .unwrap_or(-1);
                        let end = caps.get(0).map(|m| m.start()).unwrap_or(text.len());
                        let output = finalize_output(&text[..end], command, &marker);
                        crate::debug_log!("command finished, exit code {}", exit_code);
                        return Ok(ExecOutcome {
                            exit_code,
                            output,
                            timed_out: false,
                        });
                    }
                }
                Ok(None) => {
                    return Err(ShellmError::PtyWrite {
                        message: "shell output channel closed mid-command".to_string(),
                    }
                    .into());
                }
                Err(_) => {
                    // Interrupt whatever is still running so the shell comes
                    // back to a prompt.
                    crate::error_log!(
                        "command timed out after {}s: {}",
                        self.timeout.as_secs(),
                        command
                    );
                    let _ = self.pty.write_all(CTRL_C);
                    let text = clean_output(&String::from_utf8_lossy(&raw));
                    let mut output = finalize_output(&text, command, &marker);
                    if !output.is_empty() {
                        output.push('\n');
                    }
                    output.push_str(&format!(
                        "[command timed out after {} seconds and was interrupted]",
                        self.timeout.as_secs()
                    ));
                    return Ok(ExecOutcome {
                        exit_code: -1,
                        output,
                        timed_out: true,
                    });
                }
            }
        }
    }
}

/// Strip ANSI escape sequences and carriage returns from raw PTY output.
fn clean_output(raw: &str) -> String {
    static ANSI: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let ansi = ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b\][^\x07]*\x07|\x1b[=>]")
            .expect("ansi pattern is valid")
    });
    ansi.replace_all(raw, "").replace('\r', "")
}

/// Drop the echoed wrapper and any marker remnants, then cap the size.
fn finalize_output(text: &str, command: &str, marker: &str) -> String {
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.contains(marker))
        .collect();

    // The first line is usually the shell echoing the wrapper back.
    if let Some(first) = lines.first() {
        if first.contains(command) || first.contains(MARKER_PREFIX) {
            lines.remove(0);
        }
    }

    let joined = lines.join("\n").trim().to_string();
    cap_output(&joined)
}

/// Keep head and tail when output exceeds the cap.
fn cap_output(text: &str) -> String {
    if text.len() <= OUTPUT_CAP {
        return text.to_string();
    }
    let half = OUTPUT_CAP / 2;
    let head_end = (0..=half).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    let tail_start = (text.len() - half..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    format!(
        "{}\n... [{} bytes truncated] ...\n{}",
        &text[..head_end],
        text.len() - head_end - (text.len() - tail_start),
        &text[tail_start..]
    )
}
