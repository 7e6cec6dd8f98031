//! The shell proxy reactor.
//!
//! One `tokio::select!` loop multiplexes everything the overlay reacts to:
//! stdin bytes, PTY output, window resizes, the active mode's timer (escape
//! detector or line editor), and child exit. Exactly one [`Mode`] is active at any instant and mode
//! transitions are the only way input routing changes. Raw mode is held for
//! the whole session by an RAII guard and suspended around agent turns so
//! streaming output and confirmation prompts render normally.

pub mod escape;
pub mod pty;
pub mod raw_guard;

use crate::agent::tools::{BashTool, ListFilesTool, ReadFileTool, RunInShellTool, WriteFileTool};
use crate::agent::ToolRegistry;
use crate::capture::ScrollbackCapture;
use crate::config::Settings;
use crate::confirm::{ConfirmationGate, PromptGate};
use crate::context::CwdTracker;
use crate::error::ShellmError;
use crate::executor::{OutputTap, PtyExecutor};
use crate::llm::ModelClient;
use crate::overlay::{LineEditor, OverlayEvent, PROMPT};
use crate::render::{Renderer, UiEvent};
use crate::session::Session;
use crate::storage::SessionStore;
use anyhow::{Context, Result};
use escape::{EscapeAction, EscapeDetector};
use parking_lot::Mutex;
use pty::PtySession;
use raw_guard::RawModeGuard;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shell,
    Ai,
}

/// Everything the reactor needs that lives on the run() stack rather than in
/// the proxy itself. Deliberately no stdin handle: while a turn is in flight
/// nothing but the confirmation prompt may read the terminal, otherwise the
/// user's y/N answer can be stolen by a competing read.
struct TurnIo<'a> {
    guard: &'a mut RawModeGuard,
    sigint: &'a mut Signal,
}

/// Wraps the PTY output channel so that a closed channel parks instead of
/// resolving. A drained unbounded receiver resolves `recv()` immediately with
/// `None` on every poll; a select loop holding such an arm spins at full CPU
/// once the shell's reader thread exits.
struct PtyOutput {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    open: bool,
}

impl PtyOutput {
    fn new(rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        PtyOutput { rx, open: true }
    }

    /// Resolves with the next output chunk, or never again once the channel
    /// has closed. Child exit is observed on its own channel.
    async fn next_chunk(&mut self) -> Vec<u8> {
        if self.open {
            if let Some(data) = self.rx.recv().await {
                return data;
            }
            self.open = false;
        }
        std::future::pending().await
    }
}

pub struct ShellProxy {
    settings: Settings,
    mode: Mode,
    pty: PtySession,
    pty_out: PtyOutput,
    exit_rx: oneshot::Receiver<i32>,
    capture: ScrollbackCapture,
    detector: EscapeDetector,
    editor: LineEditor,
    executor: Arc<PtyExecutor>,
    tap: OutputTap,
    cwd: Arc<Mutex<CwdTracker>>,
    registry: ToolRegistry,
    client: Arc<dyn ModelClient>,
    renderer: Arc<dyn Renderer>,
    session: Session,
    store: SessionStore,
}

impl ShellProxy {
    pub fn new(
        settings: Settings,
        client: Arc<dyn ModelClient>,
        renderer: Arc<dyn Renderer>,
        session: Session,
        store: SessionStore,
    ) -> Result<Self> {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let (pty, pty_rx, exit_rx) = PtySession::spawn(&settings.shell, rows, cols)?;

        let capture = ScrollbackCapture::new(rows, cols, settings.scrollback_lines);
        let detector = EscapeDetector::new(settings.shortcuts.clone());
        let cwd = Arc::new(Mutex::new(CwdTracker::new(
            pty.child_pid().unwrap_or(std::process::id()),
        )));
        let tap = OutputTap::new();
        let executor = Arc::new(PtyExecutor::new(
            pty.clone(),
            tap.clone(),
            settings.command_timeout,
        ));

        let gate: Arc<dyn ConfirmationGate> = Arc::new(PromptGate);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(RunInShellTool::new(
            executor.clone(),
            gate.clone(),
            cwd.clone(),
        )));
        registry.register(Arc::new(BashTool::new(
            gate.clone(),
            cwd.clone(),
            settings.command_timeout,
        )));
        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(WriteFileTool::new(gate)));
        registry.register(Arc::new(ListFilesTool));

        Ok(ShellProxy {
            settings,
            mode: Mode::Shell,
            pty,
            pty_out: PtyOutput::new(pty_rx),
            exit_rx,
            capture,
            detector,
            editor: LineEditor::new(),
            executor,
            tap,
            cwd,
            registry,
            client,
            renderer,
            session,
            store,
        })
    }

    /// Run the session to completion. Returns the shell child's exit code.
    pub async fn run(mut self) -> Result<i32> {
        let mut guard = RawModeGuard::new()?;
        let mut stdin = tokio::io::stdin();
        let mut winch =
            signal(SignalKind::window_change()).context("failed to install SIGWINCH handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
        let mut buf = [0u8; 4096];

        crate::info_log!("session started, shell {}", self.settings.shell);

        let exit_code = loop {
            let deadline = match self.mode {
                Mode::Shell => self.detector.deadline(),
                Mode::Ai => self.editor.deadline(),
            }
            .map(tokio::time::Instant::from_std);

            tokio::select! {
                read = stdin.read(&mut buf) => {
                    let n = read.context("failed to read terminal input")?;
                    if n == 0 {
                        continue;
                    }
                    let data = buf[..n].to_vec();
                    let mut io = TurnIo {
                        guard: &mut guard,
                        sigint: &mut sigint,
                    };
                    self.handle_stdin(&data, &mut io).await?;
                }
                data = self.pty_out.next_chunk() => {
                    self.capture.feed(&data);
                    self.tap.forward(&data);
                    if self.mode == Mode::Shell {
                        write_stdout(&data)?;
                    }
                }
                code = &mut self.exit_rx => {
                    break code.unwrap_or(0);
                }
                _ = winch.recv() => {
                    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
                    if let Err(e) = self.pty.resize(rows, cols) {
                        crate::error_log!("resize propagation failed: {:#}", e);
                    }
                    self.capture.resize(rows, cols);
                }
                _ = sigint.recv() => {
                    // Raw mode means Ctrl+C normally arrives as a byte, not a
                    // signal; a stray SIGINT outside a turn is ignored.
                }
                _ = sleep_until_opt(deadline) => {
                    match self.mode {
                        Mode::Shell => {
                            if let Some(action) = self.detector.on_timeout(Instant::now()) {
                                let mut io = TurnIo {
                                    guard: &mut guard,
                                    sigint: &mut sigint,
                                };
                                self.apply_escape_action(action, &mut io).await?;
                            }
                        }
                        Mode::Ai => {
                            let (echo, event) = self.editor.on_timeout(Instant::now());
                            write_stdout(&echo)?;
                            if event == Some(OverlayEvent::Exit) {
                                self.exit_ai()?;
                            }
                        }
                    }
                }
            }
        };

        crate::info_log!("shell exited with code {}", exit_code);
        drop(guard);
        Ok(exit_code)
    }

    async fn handle_stdin(&mut self, data: &[u8], io: &mut TurnIo<'_>) -> Result<()> {
        let mut i = 0;
        while i < data.len() {
            match self.mode {
                Mode::Shell => {
                    let actions = self.detector.on_byte(data[i], Instant::now());
                    i += 1;
                    for action in actions {
                        self.apply_escape_action(action, io).await?;
                    }
                }
                Mode::Ai => {
                    let (echo, event, used) = self.editor.handle_input(&data[i..], Instant::now());
                    write_stdout(&echo)?;
                    // An event may leave a tail unconsumed; it re-enters the
                    // loop under whatever mode the event switched to.
                    i += used;
                    match event {
                        Some(OverlayEvent::Exit) => self.exit_ai()?,
                        Some(OverlayEvent::Submit(line)) => {
                            self.run_agent_turn(line, io).await?;
                            if self.mode == Mode::Ai {
                                write_stdout(PROMPT.as_bytes())?;
                            }
                        }
                        None => {}
                    }
                }
            }
        }
        Ok(())
    }

    async fn apply_escape_action(
        &mut self,
        action: EscapeAction,
        io: &mut TurnIo<'_>,
    ) -> Result<()> {
        match action {
            EscapeAction::Forward(bytes) => self.pty.write_all(&bytes),
            EscapeAction::EnterAi { prompt } => self.enter_ai(prompt, io).await,
        }
    }

    async fn enter_ai(&mut self, prompt: Option<String>, io: &mut TurnIo<'_>) -> Result<()> {
        self.mode = Mode::Ai;
        self.editor.clear();
        write_stdout(b"\r\n")?;
        self.renderer.emit(UiEvent::ModeChanged { ai: true });
        match prompt {
            Some(prompt) => {
                write_stdout(format!("\r{}{}\r\n", PROMPT, prompt).as_bytes())?;
                self.run_agent_turn(prompt, io).await?;
                if self.mode == Mode::Ai {
                    write_stdout(PROMPT.as_bytes())?;
                }
            }
            None => {
                write_stdout(format!("\r{}", PROMPT).as_bytes())?;
            }
        }
        Ok(())
    }

    fn exit_ai(&mut self) -> Result<()> {
        self.mode = Mode::Shell;
        self.renderer.emit(UiEvent::ModeChanged { ai: false });
        // Nudge the shell into redrawing its prompt.
        self.pty.write_all(b"\n")
    }

    /// Run one agent turn while keeping the PTY pump alive, so in-shell tool
    /// executions can both capture and display their output.
    async fn run_agent_turn(&mut self, prompt: String, io: &mut TurnIo<'_>) -> Result<()> {
        let mut context = format!("cwd: {}\n", self.cwd.lock().display());
        if let Some(captured) = self.capture.get_context(self.settings.context_lines) {
            context.push_str(&captured);
        }
        self.session.set_shell_context(&context);
        self.session.add_user(prompt);

        io.guard.suspend()?;
        write_stdout(b"\n")?;

        let cancel = CancellationToken::new();
        let result = {
            let this = &mut *self;
            let turn = crate::agent::run_turn(
                this.client.as_ref(),
                &mut this.session,
                &this.registry,
                this.renderer.as_ref(),
                &cancel,
            );
            tokio::pin!(turn);
            // No stdin arm here: the terminal is in cooked mode, so Ctrl+C
            // arrives as SIGINT, and confirmation prompts must be the only
            // reader of the terminal while they are up.
            loop {
                tokio::select! {
                    result = &mut turn => break result,
                    data = this.pty_out.next_chunk() => {
                        this.capture.feed(&data);
                        this.tap.forward(&data);
                        if this.executor.is_busy() {
                            write_stdout(&data)?;
                        }
                    }
                    _ = io.sigint.recv() => {
                        cancel.cancel();
                    }
                }
            }
        };

        io.guard.resume()?;

        if let Err(e) = self.store.save(&self.session) {
            crate::error_log!("failed to persist session: {:#}", e);
        }

        match result {
            Ok(()) => {}
            Err(e) if matches!(e.downcast_ref::<ShellmError>(), Some(ShellmError::Interrupted)) => {
                self.renderer
                    .emit(UiEvent::Warning("generation cancelled".to_string()));
            }
            Err(e) => {
                self.renderer.emit(UiEvent::Error(format!("{:#}", e)));
            }
        }
        Ok(())
    }
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn write_stdout(data: &[u8]) -> Result<()> {
    use std::io::Write;
    let mut out = std::io::stdout().lock();
    out.write_all(data)
        .and_then(|_| out.flush())
        .context("failed to write to terminal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pty_output_delivers_then_parks_on_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut out = PtyOutput::new(rx);
        tx.send(b"hi".to_vec()).unwrap();
        drop(tx);
        assert_eq!(out.next_chunk().await, b"hi".to_vec());

        // A dead channel must park, not keep resolving, so select loops
        // holding this arm cannot spin while waiting on child exit.
        for _ in 0..2 {
            let wait = tokio::time::timeout(Duration::from_millis(20), out.next_chunk()).await;
            assert!(wait.is_err());
        }
        assert!(!out.open);
    }
}
