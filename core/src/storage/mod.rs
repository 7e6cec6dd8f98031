//! Session persistence.
//!
//! Sessions are whole JSON documents under the data directory, written with
//! the temp-file + rename pattern so a crash mid-write never corrupts an
//! existing session. `latest.json` tracks the most recent session for
//! `--resume`. The engine treats this module as a pure sink/source called
//! after each completed exchange.

use crate::session::Session;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub struct SessionStore {
    dir: PathBuf,
}

/// Listing row for the `sessions` subcommand.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub model: String,
    pub message_count: usize,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create sessions directory {}", dir.display()))?;
        Ok(SessionStore { dir })
    }

    /// Persist a session atomically and update the latest pointer.
    pub fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        self.write_atomic(&format!("session_{}.json", session.id), &json)?;
        self.write_atomic("latest.json", &json)?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Session> {
        let path = self.dir.join(format!("session_{}.json", id));
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("no stored session {}", id))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse session file {}", path.display()))
    }

    pub fn load_latest(&self) -> Option<Session> {
        let raw = std::fs::read_to_string(self.dir.join("latest.json")).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                crate::error_log!("failed to parse latest.json: {}", e);
                None
            }
        }
    }

    /// All stored sessions, most recently updated first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                crate::error_log!("failed to read sessions directory: {}", e);
                return Vec::new();
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("session_") || !name.ends_with(".json") {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<Session>(&raw) {
                Ok(session) => summaries.push(SessionSummary {
                    id: session.id.clone(),
                    title: session.title.clone().unwrap_or_else(|| "(untitled)".into()),
                    model: session.model.clone(),
                    message_count: session.visible_message_count(),
                    updated_at: session.updated_at,
                }),
                Err(e) => {
                    crate::error_log!("skipping unreadable session file {}: {}", name, e);
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    fn write_atomic(&self, name: &str, contents: &str) -> Result<()> {
        let tmp = self.dir.join(format!("{}.tmp", name));
        let target = self.dir.join(name);
        std::fs::write(&tmp, contents)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &target)
            .with_context(|| format!("failed to rename {} into place", tmp.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = store();
        let mut session = Session::new("local-model", "sys");
        session.add_user("hello");
        session.add_assistant("hi");
        store.save(&session).unwrap();

        let loaded = store.load(&session.id).unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.messages().len(), session.messages().len());
        assert_eq!(loaded.title.as_deref(), Some("hello"));
    }

    #[test]
    fn test_latest_points_at_most_recent_save() {
        let (_dir, store) = store();
        let mut first = Session::new("m", "sys");
        first.add_user("first");
        store.save(&first).unwrap();

        let mut second = Session::new("m", "sys");
        second.add_user("second");
        store.save(&second).unwrap();

        let latest = store.load_latest().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn test_list_sorted_and_skips_garbage() {
        let (dir, store) = store();
        let mut a = Session::new("m", "sys");
        a.add_user("older");
        store.save(&a).unwrap();

        std::fs::write(dir.path().join("session_junk.json"), "not json").unwrap();

        let mut b = Session::new("m", "sys");
        b.add_user("newer");
        store.save(&b).unwrap();

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "newer");
        assert_eq!(list[1].title, "older");
    }

    #[test]
    fn test_load_missing_session_is_error() {
        let (_dir, store) = store();
        assert!(store.load("nope").is_err());
    }
}
