//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use shellm_core::config::CliOverrides;

#[derive(Parser, Debug)]
#[command(
    name = "shellm",
    version,
    about = "Transparent shell overlay with a double-ESC AI mode",
    long_about = "Wraps your shell in a pseudo-terminal. Press ESC twice to talk to a \
                  local (or remote) OpenAI-compatible model with your recent terminal \
                  output as context; press ESC to drop back to the shell."
)]
pub struct Cli {
    /// Full base URL of the OpenAI-compatible server
    #[arg(long)]
    pub base_url: Option<String>,

    /// Port of a local server (shorthand for --base-url http://localhost:<port>)
    #[arg(long)]
    pub port: Option<u16>,

    /// Model name to send in requests
    #[arg(long)]
    pub model: Option<String>,

    /// API key for authentication
    #[arg(long, env = "SHELLM_API_KEY")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Override the default system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Shell to spawn (default: $SHELL, then /bin/sh)
    #[arg(long)]
    pub shell: Option<String>,

    /// Timeout in seconds for agent-run commands
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// Resume the most recent session, or a specific one by id
    #[arg(long, value_name = "ID", num_args = 0..=1, default_missing_value = "latest")]
    pub resume: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stored sessions
    Sessions,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        // --base-url wins over --port
        let base_url = self
            .base_url
            .clone()
            .or_else(|| self.port.map(|p| format!("http://localhost:{}", p)));
        CliOverrides {
            base_url,
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
            system_prompt: self.system_prompt.clone(),
            shell: self.shell.clone(),
            command_timeout_secs: self.command_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_wins_over_port() {
        let cli = Cli::parse_from(["shellm", "--base-url", "http://host:9", "--port", "1234"]);
        assert_eq!(cli.overrides().base_url.as_deref(), Some("http://host:9"));
    }

    #[test]
    fn test_port_shorthand() {
        let cli = Cli::parse_from(["shellm", "--port", "11434"]);
        assert_eq!(
            cli.overrides().base_url.as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_resume_without_value_means_latest() {
        let cli = Cli::parse_from(["shellm", "--resume"]);
        assert_eq!(cli.resume.as_deref(), Some("latest"));

        let cli = Cli::parse_from(["shellm", "--resume", "ab12cd34ef56"]);
        assert_eq!(cli.resume.as_deref(), Some("ab12cd34ef56"));

        let cli = Cli::parse_from(["shellm"]);
        assert_eq!(cli.resume, None);
    }

    #[test]
    fn test_sessions_subcommand_parses() {
        let cli = Cli::parse_from(["shellm", "sessions"]);
        assert!(matches!(cli.command, Some(Command::Sessions)));
    }
}
