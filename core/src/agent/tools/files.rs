//! File tools: read, write, list.

use crate::agent::tool::Tool;
use crate::agent::tools::expand_home;
use crate::confirm::ConfirmationGate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use similar::TextDiff;
use std::sync::Arc;

const MAX_FILE_SIZE: u64 = 100 * 1024;
const MAX_LIST_RESULTS: usize = 200;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read",
                },
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .context("missing 'path' argument")?;
        let expanded = expand_home(path);

        if !expanded.exists() {
            return Ok(format!("Error: file not found: {}", path));
        }

        let size = std::fs::metadata(&expanded)
            .with_context(|| format!("failed to stat {}", path))?
            .len();
        if size > MAX_FILE_SIZE {
            return Ok(format!(
                "Error: file is {} bytes, exceeds {} byte limit",
                size, MAX_FILE_SIZE
            ));
        }

        let raw = std::fs::read(&expanded).with_context(|| format!("failed to read {}", path))?;
        // Null byte in the first 8KB means binary.
        if raw.iter().take(8192).any(|&b| b == 0) {
            return Ok(format!("Error: file appears to be binary: {}", path));
        }

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

pub struct WriteFileTool {
    gate: Arc<dyn ConfirmationGate>,
}

impl WriteFileTool {
    pub fn new(gate: Arc<dyn ConfirmationGate>) -> Self {
        WriteFileTool { gate }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file at the given path. Creates parent directories if needed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to write",
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file",
                },
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .context("missing 'path' argument")?;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .context("missing 'content' argument")?;
        let expanded = expand_home(path);

        let summary = format!("Write to: {} ({} chars)", path, content.chars().count());
        let detail = if expanded.exists() {
            match std::fs::read_to_string(&expanded) {
                Ok(old) => {
                    let diff = TextDiff::from_lines(old.as_str(), content)
                        .unified_diff()
                        .header("before", "after")
                        .to_string();
                    if diff.is_empty() {
                        "(no changes)".to_string()
                    } else {
                        diff
                    }
                }
                Err(_) => "(could not generate diff preview)".to_string(),
            }
        } else {
            "(new file)".to_string()
        };

        // No bytes touch the filesystem before approval.
        if !self.gate.confirm(&summary, &detail).await {
            return Ok("Write cancelled by user.".to_string());
        }

        if let Some(parent) = expanded.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create parent directories for {}", path))?;
        }
        std::fs::write(&expanded, content).with_context(|| format!("failed to write {}", path))?;

        Ok(format!(
            "Wrote {} chars to {}",
            content.chars().count(),
            path
        ))
    }
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files matching a glob pattern (supports ** for recursive matching)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match files (e.g. 'src/**/*.rs')",
                },
            },
            "required": ["pattern"],
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .context("missing 'pattern' argument")?;
        let expanded = expand_home(pattern).to_string_lossy().into_owned();

        let paths = glob::glob(&expanded)
            .with_context(|| format!("invalid glob pattern '{}'", pattern))?;
        let mut matches: Vec<String> = paths
            .filter_map(|entry| entry.ok())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        matches.sort();

        if matches.is_empty() {
            return Ok(format!("No files matching '{}'", pattern));
        }

        let total = matches.len();
        if total > MAX_LIST_RESULTS {
            matches.truncate(MAX_LIST_RESULTS);
            return Ok(format!(
                "{}\n... ({} total, showing first {})",
                matches.join("\n"),
                total,
                MAX_LIST_RESULTS
            ));
        }

        Ok(matches.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::testing::FixedGate;
    use std::io::Write as _;

    #[tokio::test]
    async fn test_read_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hello\nworld\n").unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path.to_str().unwrap()}))
            .await
            .unwrap();
        assert_eq!(result, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_read_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "stable contents").unwrap();
        let args = json!({"path": path.to_str().unwrap()});

        let first = ReadFileTool.execute(args.clone()).await.unwrap();
        let second = ReadFileTool.execute(args).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let result = ReadFileTool
            .execute(json!({"path": "/no/such/file/anywhere"}))
            .await
            .unwrap();
        assert!(result.starts_with("Error: file not found"));
    }

    #[tokio::test]
    async fn test_read_refuses_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"\x00\x01\x02binary").unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.contains("appears to be binary"));
    }

    #[tokio::test]
    async fn test_read_refuses_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(MAX_FILE_SIZE as usize + 1)).unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path.to_str().unwrap()}))
            .await
            .unwrap();
        assert!(result.contains("exceeds"));
    }

    #[tokio::test]
    async fn test_write_declined_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.txt");
        std::fs::write(&path, "original").unwrap();

        let gate = FixedGate::declining();
        let tool = WriteFileTool::new(Arc::new(gate.clone()));
        let result = tool
            .execute(json!({"path": path.to_str().unwrap(), "content": "overwritten"}))
            .await
            .unwrap();

        assert_eq!(result, "Write cancelled by user.");
        assert_eq!(gate.times_asked(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        let tool = WriteFileTool::new(Arc::new(FixedGate::approving()));
        tool.execute(json!({"path": path.to_str().unwrap(), "content": "deep"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "deep");
    }

    #[tokio::test]
    async fn test_overwrite_always_asks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.txt");
        let gate = FixedGate::approving();
        let tool = WriteFileTool::new(Arc::new(gate.clone()));
        let args = json!({"path": path.to_str().unwrap(), "content": "v"});

        tool.execute(args.clone()).await.unwrap();
        tool.execute(args).await.unwrap();
        assert_eq!(gate.times_asked(), 2);
    }

    #[tokio::test]
    async fn test_list_files_sorted_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta.rs", "alpha.rs", "mid.rs"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let pattern = format!("{}/*.rs", dir.path().display());

        let first = ListFilesTool
            .execute(json!({"pattern": pattern}))
            .await
            .unwrap();
        let second = ListFilesTool
            .execute(json!({"pattern": pattern}))
            .await
            .unwrap();
        assert_eq!(first, second);

        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("alpha.rs"));
        assert!(lines[2].ends_with("zeta.rs"));
    }

    #[tokio::test]
    async fn test_list_files_caps_results() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..MAX_LIST_RESULTS + 10 {
            std::fs::write(dir.path().join(format!("f{:04}.txt", i)), "").unwrap();
        }
        let pattern = format!("{}/*.txt", dir.path().display());
        let result = ListFilesTool
            .execute(json!({"pattern": pattern}))
            .await
            .unwrap();

        let listed = result.lines().filter(|l| l.ends_with(".txt")).count();
        assert_eq!(listed, MAX_LIST_RESULTS);
        assert!(result.contains(&format!("{} total", MAX_LIST_RESULTS + 10)));
    }

    #[tokio::test]
    async fn test_list_no_matches() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.nope", dir.path().display());
        let result = ListFilesTool
            .execute(json!({"pattern": pattern}))
            .await
            .unwrap();
        assert!(result.starts_with("No files matching"));
    }
}
