//! Working-directory tracking for the child shell.
//!
//! The agent needs the shell's cwd (for confirmations and context), but only
//! the kernel knows it authoritatively. Lookups are platform-specific and not
//! free, so results are cached for a second. Any failure means "unknown",
//! never an error.

use std::path::PathBuf;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(1);

pub struct CwdTracker {
    pid: u32,
    cached: Option<(PathBuf, Instant)>,
}

impl CwdTracker {
    pub fn new(pid: u32) -> Self {
        CwdTracker { pid, cached: None }
    }

    /// The child's current working directory, or None if it cannot be read
    /// (process gone, permission denied, unsupported platform).
    pub fn get_cwd(&mut self) -> Option<PathBuf> {
        if let Some((path, at)) = &self.cached {
            if at.elapsed() < CACHE_TTL {
                return Some(path.clone());
            }
        }
        let cwd = read_cwd(self.pid)?;
        self.cached = Some((cwd.clone(), Instant::now()));
        Some(cwd)
    }

    /// Display form for prompts; "unknown" when unavailable.
    pub fn display(&mut self) -> String {
        self.get_cwd()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(target_os = "linux")]
fn read_cwd(pid: u32) -> Option<PathBuf> {
    std::fs::read_link(format!("/proc/{}/cwd", pid)).ok()
}

#[cfg(target_os = "macos")]
fn read_cwd(pid: u32) -> Option<PathBuf> {
    // lsof -Fn prints an "fcwd" record followed by an n-prefixed path line.
    let output = std::process::Command::new("lsof")
        .args(["-a", "-d", "cwd", "-p", &pid.to_string(), "-Fn"])
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    let mut saw_cwd_record = false;
    for line in text.lines() {
        if line == "fcwd" {
            saw_cwd_record = true;
        } else if saw_cwd_record {
            if let Some(path) = line.strip_prefix('n') {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn read_cwd(_pid: u32) -> Option<PathBuf> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reads_own_process_cwd() {
        let mut tracker = CwdTracker::new(std::process::id());
        let cwd = tracker.get_cwd().expect("own cwd should be readable");
        assert_eq!(cwd, std::env::current_dir().unwrap());
    }

    #[test]
    fn test_dead_pid_is_unknown() {
        // PIDs near the u32 max are not valid processes.
        let mut tracker = CwdTracker::new(u32::MAX - 1);
        assert!(tracker.get_cwd().is_none());
        assert_eq!(tracker.display(), "unknown");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_cache_serves_repeat_lookups() {
        let mut tracker = CwdTracker::new(std::process::id());
        let first = tracker.get_cwd();
        let second = tracker.get_cwd();
        assert_eq!(first, second);
        assert!(tracker.cached.is_some());
    }
}
