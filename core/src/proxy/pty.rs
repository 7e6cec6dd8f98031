//! Pseudo-terminal ownership: open the pair, spawn the user's shell on the
//! slave side, pump master output into the reactor over a channel.

use crate::error::ShellmError;
use anyhow::Result;
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// Handle to the live PTY pair. Clones share the same master and writer, so
/// the executor can inject commands into the session the proxy owns.
pub struct PtySession {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    child_pid: Option<u32>,
}

impl Clone for PtySession {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            master: self.master.clone(),
            child_pid: self.child_pid,
        }
    }
}

impl PtySession {
    /// Spawn `shell` attached to a fresh PTY of the given size.
    ///
    /// Returns the session handle, the raw output channel fed by a reader
    /// thread, and a oneshot that resolves with the shell's exit code.
    pub fn spawn(
        shell: &str,
        rows: u16,
        cols: u16,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<u8>>, oneshot::Receiver<i32>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ShellmError::PtyAllocation {
                message: e.to_string(),
            })?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.env("TERM", "xterm-256color");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let mut child =
            pair.slave
                .spawn_command(cmd)
                .map_err(|e| ShellmError::SpawnFailed {
                    shell: shell.to_string(),
                    message: e.to_string(),
                })?;
        let child_pid = child.process_id();
        crate::debug_log!("spawned shell {} (pid {:?})", shell, child_pid);

        // Output pump: blocking reads on a dedicated thread, chunks into the
        // reactor via channel.
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ShellmError::PtyAllocation {
                message: format!("failed to clone reader: {}", e),
            })?;
        thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            loop {
                match std::io::Read::read(&mut reader, &mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        if out_tx.send(buffer[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        crate::debug_log!("pty reader finished: {}", e);
                        break;
                    }
                }
            }
        });

        // Exit watch: child.wait() blocks, so it also gets its own thread.
        let (exit_tx, exit_rx) = oneshot::channel();
        thread::spawn(move || {
            let code = match child.wait() {
                Ok(status) => status.exit_code() as i32,
                Err(e) => {
                    crate::error_log!("waiting for shell child failed: {}", e);
                    1
                }
            };
            let _ = exit_tx.send(code);
        });

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ShellmError::PtyAllocation {
                message: format!("failed to take writer: {}", e),
            })?;

        Ok((
            Self {
                writer: Arc::new(Mutex::new(writer)),
                master: Arc::new(Mutex::new(pair.master)),
                child_pid,
            },
            out_rx,
            exit_rx,
        ))
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }

    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("PTY writer lock poisoned"))?;
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| {
                ShellmError::PtyWrite {
                    message: e.to_string(),
                }
                .into()
            })
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let master = self
            .master
            .lock()
            .map_err(|_| anyhow::anyhow!("PTY master lock poisoned"))?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| anyhow::anyhow!("failed to resize PTY: {}", e))
    }
}
