pub mod bash;
pub mod files;
pub mod shell;

pub use bash::BashTool;
pub use files::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use shell::RunInShellTool;

use std::path::PathBuf;

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
