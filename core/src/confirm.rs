//! User confirmation gate for destructive tool actions.
//!
//! The bash tool, the live-shell executor and write_file all go through this
//! seam; confirmation is the sole safety gate, so it must show the literal
//! action before anything happens. Tests inject an auto-answering gate.

use async_trait::async_trait;

/// Asks the user to approve an action. Returns false on decline or any
/// prompt failure (a broken prompt must never default to approval).
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, summary: &str, detail: &str) -> bool;
}

/// Interactive y/N prompt via dialoguer. Expects the terminal to be in
/// cooked mode, which holds during agent turns.
pub struct PromptGate;

#[async_trait]
impl ConfirmationGate for PromptGate {
    async fn confirm(&self, summary: &str, detail: &str) -> bool {
        let summary = summary.to_string();
        let detail = detail.to_string();
        // dialoguer blocks on stdin; keep it off the reactor.
        let answer = tokio::task::spawn_blocking(move || {
            if !detail.is_empty() {
                println!("{}", detail);
            }
            dialoguer::Confirm::new()
                .with_prompt(summary)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await;
        answer.unwrap_or(false)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Always answers the same way; counts how often it was asked.
    #[derive(Clone)]
    pub struct FixedGate {
        answer: bool,
        asked: Arc<AtomicUsize>,
    }

    impl FixedGate {
        pub fn approving() -> Self {
            FixedGate {
                answer: true,
                asked: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn declining() -> Self {
            FixedGate {
                answer: false,
                asked: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn times_asked(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConfirmationGate for FixedGate {
        async fn confirm(&self, _summary: &str, _detail: &str) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }
}
