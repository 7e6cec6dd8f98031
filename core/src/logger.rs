//! File-backed debug logger.
//!
//! While the proxy is running, stdout and stderr belong to the proxied shell,
//! so diagnostics cannot be printed. Log lines go to a bounded in-memory ring
//! plus, once configured, a logfile under the data directory.

use chrono::Local;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub module: String,
    pub message: String,
}

pub struct Logger {
    ring: VecDeque<LogEntry>,
    max_entries: usize,
    file_path: Option<PathBuf>,
}

static LOGGER: OnceLock<Arc<Mutex<Logger>>> = OnceLock::new();

fn global() -> &'static Arc<Mutex<Logger>> {
    LOGGER.get_or_init(|| Arc::new(Mutex::new(Logger::new(1000))))
}

impl Logger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(max_entries),
            max_entries,
            file_path: None,
        }
    }

    fn set_file_path(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        self.file_path = Some(path);
    }

    fn log(&mut self, level: &str, module: &str, message: &str) {
        let entry = LogEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level: level.to_string(),
            module: module.to_string(),
            message: message.to_string(),
        };

        if let Some(path) = &self.file_path {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(
                    file,
                    "[{}] [{}] [{}] {}",
                    entry.timestamp, entry.level, entry.module, entry.message
                );
            }
        }

        if self.ring.len() >= self.max_entries {
            self.ring.pop_front();
        }
        self.ring.push_back(entry);
    }

    fn recent(&self, n: usize) -> Vec<String> {
        self.ring
            .iter()
            .rev()
            .take(n)
            .map(|e| format!("[{}] [{}] [{}] {}", e.timestamp, e.level, e.module, e.message))
            .collect()
    }
}

/// Point the logger at `<data_dir>/shellm.log`. Called once at startup.
pub fn init(data_dir: PathBuf) {
    let logger = global();
    let mut logger = logger.lock().unwrap();
    logger.set_file_path(data_dir.join("shellm.log"));
}

pub fn log(level: &str, module: &str, message: impl Into<String>) {
    let logger = global();
    let mut logger = logger.lock().unwrap();
    logger.log(level, module, &message.into());
}

pub fn recent_logs(n: usize) -> Vec<String> {
    let logger = global();
    let logger = logger.lock().unwrap();
    logger.recent(n)
}

#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::logger::log("DEBUG", module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        $crate::logger::log("INFO", module_path!(), format!($($arg)*));
    };
}

#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        $crate::logger::log("ERROR", module_path!(), format!($($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_eviction() {
        let mut logger = Logger::new(3);
        for i in 0..5 {
            logger.log("DEBUG", "test", &format!("msg {}", i));
        }
        let recent = logger.recent(10);
        assert_eq!(recent.len(), 3);
        // Newest first
        assert!(recent[0].ends_with("msg 4"));
        assert!(recent[2].ends_with("msg 2"));
    }
}
