//! Structured error types for shellm
//!
//! The taxonomy mirrors how errors propagate through the overlay: transport
//! problems are recoverable per turn, shell execution failures become tool
//! results, and only terminal/process errors are fatal to the session.

use thiserror::Error;

/// Primary error type for shellm operations
#[derive(Error, Debug)]
pub enum ShellmError {
    // =========================================================================
    // Transport errors: surfaced to the user, session state preserved
    // =========================================================================
    /// Could not reach the model endpoint
    #[error("cannot reach model server at {base_url}: {message}")]
    Connection { base_url: String, message: String },

    /// Authentication/authorization failure
    #[error("authentication failed: {message}")]
    Unauthorized { message: String },

    /// The stream dropped before completion
    #[error("model stream disconnected: {message}")]
    StreamDisconnected { message: String },

    /// Provider returned a non-success status
    #[error("model server error ({status}): {message}")]
    Provider { status: u16, message: String },

    // =========================================================================
    // Shell execution errors: converted to tool result strings before the loop
    // =========================================================================
    /// Writing into the PTY failed
    #[error("failed to write to PTY: {message}")]
    PtyWrite { message: String },

    /// Another command is already executing in the shell session
    #[error("another command is already running in the shell session")]
    ExecutionInFlight,

    // =========================================================================
    // Terminal / process errors: fatal, terminal mode still restored
    // =========================================================================
    /// Spawning the user's shell failed
    #[error("failed to spawn shell {shell}: {message}")]
    SpawnFailed { shell: String, message: String },

    /// The pseudo-terminal pair could not be allocated
    #[error("failed to allocate PTY: {message}")]
    PtyAllocation { message: String },

    // =========================================================================
    // Cancellation: normal control flow, not an error in the user's eyes
    // =========================================================================
    /// The in-flight operation was interrupted by the user
    #[error("interrupted")]
    Interrupted,
}

impl ShellmError {
    /// Whether this error ends the session rather than the current turn.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShellmError::SpawnFailed { .. } | ShellmError::PtyAllocation { .. }
        )
    }
}
