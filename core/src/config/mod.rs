//! Settings resolution.
//!
//! Engine components never read files or the environment themselves; they
//! receive a fully resolved [`Settings`] at construction time. Resolution
//! precedence is CLI override > config file > built-in default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_MODEL: &str = "local-model";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SCROLLBACK_LINES: usize = 5000;
pub const DEFAULT_CONTEXT_LINES: usize = 200;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are shellm, an AI assistant embedded in the user's terminal. You can see \
recent terminal output and you have tools to run commands in the user's live \
shell session, read and write files, and list directories. Use them when the \
user asks you to perform tasks. Always explain what you are about to do \
before calling a tool. Be concise and direct.";

/// A double-ESC shortcut binding: pressing `key` inside the shortcut window
/// enters AI mode with `prompt` already submitted.
#[derive(Debug, Clone)]
pub struct ShortcutBinding {
    pub key: u8,
    pub prompt: String,
}

pub fn default_shortcuts() -> Vec<ShortcutBinding> {
    vec![
        ShortcutBinding {
            key: b'f',
            prompt: "The last command failed. Look at the terminal output, figure out \
                     what went wrong, and fix it."
                .to_string(),
        },
        ShortcutBinding {
            key: b'e',
            prompt: "Explain what just happened in the terminal output above.".to_string(),
        },
    ]
}

/// Fully resolved runtime settings, passed by value into the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub system_prompt: String,
    /// Shell to spawn; defaults to $SHELL at resolution time.
    pub shell: String,
    pub command_timeout: Duration,
    pub scrollback_lines: usize,
    pub context_lines: usize,
    pub shortcuts: Vec<ShortcutBinding>,
    pub data_dir: PathBuf,
}

/// Values the CLI layer passes in; `None` means "not given on the command line".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub shell: Option<String>,
    pub command_timeout_secs: Option<u64>,
}

/// On-disk config file shape (`~/.config/shellm/config.toml`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub shell: Option<String>,
    pub command_timeout_secs: Option<u64>,
    pub scrollback_lines: Option<usize>,
    pub context_lines: Option<usize>,
}

impl FileConfig {
    /// Load the config file if it exists; a missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = match dirs::config_dir() {
            Some(dir) => dir.join("shellm/config.toml"),
            None => return Ok(Self::default()),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

impl Settings {
    /// Resolve final settings from CLI overrides and an already-loaded file
    /// config. Pure; all filesystem access happens in [`FileConfig::load`].
    pub fn resolve(cli: CliOverrides, file: FileConfig, env_shell: Option<String>) -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("shellm"))
            .unwrap_or_else(|| PathBuf::from(".shellm"));

        Settings {
            base_url: pick(cli.base_url, file.base_url, DEFAULT_BASE_URL.to_string()),
            model: pick(cli.model, file.model, DEFAULT_MODEL.to_string()),
            api_key: cli.api_key.or(file.api_key),
            temperature: cli.temperature.or(file.temperature),
            system_prompt: pick(
                cli.system_prompt,
                file.system_prompt,
                DEFAULT_SYSTEM_PROMPT.to_string(),
            ),
            shell: pick(
                cli.shell,
                file.shell,
                env_shell.unwrap_or_else(|| "/bin/sh".to_string()),
            ),
            command_timeout: Duration::from_secs(pick(
                cli.command_timeout_secs,
                file.command_timeout_secs,
                DEFAULT_COMMAND_TIMEOUT_SECS,
            )),
            scrollback_lines: file.scrollback_lines.unwrap_or(DEFAULT_SCROLLBACK_LINES),
            context_lines: file.context_lines.unwrap_or(DEFAULT_CONTEXT_LINES),
            shortcuts: default_shortcuts(),
            data_dir,
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }
}

fn pick<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_cli_over_file_over_default() {
        let cli = CliOverrides {
            model: Some("cli-model".into()),
            ..Default::default()
        };
        let file = FileConfig {
            model: Some("file-model".into()),
            base_url: Some("http://localhost:11434".into()),
            ..Default::default()
        };
        let settings = Settings::resolve(cli, file, None);
        assert_eq!(settings.model, "cli-model");
        assert_eq!(settings.base_url, "http://localhost:11434");
        assert_eq!(
            settings.command_timeout,
            Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_shell_falls_back_to_env_then_sh() {
        let settings = Settings::resolve(
            CliOverrides::default(),
            FileConfig::default(),
            Some("/bin/zsh".into()),
        );
        assert_eq!(settings.shell, "/bin/zsh");

        let settings = Settings::resolve(CliOverrides::default(), FileConfig::default(), None);
        assert_eq!(settings.shell, "/bin/sh");
    }

    #[test]
    fn test_file_config_parses_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"qwen\"\ntemperature = 0.2\n").unwrap();
        let file = FileConfig::load_from(&path).unwrap();
        assert_eq!(file.model.as_deref(), Some("qwen"));
        assert_eq!(file.temperature, Some(0.2));
        assert!(file.base_url.is_none());
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let file = FileConfig::load_from(std::path::Path::new("/nonexistent/config.toml")).unwrap();
        assert!(file.model.is_none());
    }
}
