//! Raw-mode lifetime management.
//!
//! The real terminal must be in raw mode while the proxy is live so every
//! keystroke reaches the detector unbuffered, and must be restored no matter
//! how the program leaves. Drop handles the restore; `suspend`/`resume`
//! bracket interactive prompts that need cooked mode back temporarily.

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn new() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(RawModeGuard { active: true })
    }

    pub fn suspend(&mut self) -> Result<()> {
        if self.active {
            disable_raw_mode().context("failed to disable raw terminal mode")?;
            self.active = false;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.active {
            enable_raw_mode().context("failed to re-enable raw terminal mode")?;
            self.active = true;
        }
        Ok(())
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
        }
    }
}
