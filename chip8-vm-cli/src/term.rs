//! Terminal mode setup.
use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, Show},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};

/// Puts the terminal in raw mode on an alternate screen, and restores
/// it when dropped.
pub struct TerminalGuard {
    reports_release: bool,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, Hide)?;

        // Key release events need the keyboard enhancement protocol.
        let reports_release = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if reports_release {
            execute!(
                out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        log::debug!("terminal reports key release: {reports_release}");

        Ok(Self { reports_release })
    }

    pub fn reports_release(&self) -> bool {
        self.reports_release
    }

    fn restore(&self) -> io::Result<()> {
        let mut out = io::stdout();
        if self.reports_release {
            execute!(out, PopKeyboardEnhancementFlags)?;
        }
        execute!(out, Show, LeaveAlternateScreen)?;
        out.flush()?;
        terminal::disable_raw_mode()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            log::error!("failed to restore terminal: {err}");
        }
    }
}
