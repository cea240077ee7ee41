//! The runtime session: one terminal-multiplexer session with the dashboard
//! renderer in one window and the button controller in the other.
//!
//! Everything here goes through two narrow seams, [`SessionManager`] and
//! [`ProcessProbe`], so the supervisor's sequencing can be exercised without
//! tmux or a process table.

mod probe;
mod supervisor;
mod tmux;

use anyhow::Result;

pub use probe::PgrepProbe;
pub use supervisor::{ProbeTiming, Supervisor, SupervisorError, SupervisorOutcome};
pub use tmux::TmuxSessionManager;

/// `session:window`, the target syntax every session command accepts.
pub fn target(session: &str, window: &str) -> String {
    format!("{session}:{window}")
}

/// Operations the supervisor and the controller need from the multiplexer.
pub trait SessionManager {
    /// Version string; fails when the multiplexer is not installed.
    fn version(&self) -> Result<String>;
    fn has_session(&self, session: &str) -> Result<bool>;
    /// Create a detached session whose first window runs `command`.
    fn new_session(&self, session: &str, window: &str, command: &str) -> Result<()>;
    fn new_window(&self, session: &str, window: &str) -> Result<()>;
    /// Each entry is one key argument (`"C-c"`, `"Enter"`, or literal text).
    fn send_keys(&self, target: &str, keys: &[&str]) -> Result<()>;
    fn set_option(&self, session: &str, option: &str, value: &str) -> Result<()>;
    fn select_window(&self, target: &str) -> Result<()>;
    /// Window names in index order.
    fn list_windows(&self, session: &str) -> Result<Vec<String>>;
    fn capture_pane(&self, target: &str) -> Result<String>;
    fn kill_session(&self, session: &str) -> Result<()>;
    /// PID of the shell running in the target pane.
    fn pane_pid(&self, target: &str) -> Result<Option<u32>>;
}

/// Answers whether a process whose full command line matches a pattern is
/// currently running.
pub trait ProcessProbe {
    fn is_running(&self, signature: &str) -> Result<bool>;
    /// First child of `parent` whose command line matches `pattern`.
    fn child_matching(&self, parent: u32, pattern: &str) -> Result<Option<u32>>;
}

impl<T: SessionManager + ?Sized> SessionManager for &T {
    fn version(&self) -> Result<String> {
        (**self).version()
    }
    fn has_session(&self, session: &str) -> Result<bool> {
        (**self).has_session(session)
    }
    fn new_session(&self, session: &str, window: &str, command: &str) -> Result<()> {
        (**self).new_session(session, window, command)
    }
    fn new_window(&self, session: &str, window: &str) -> Result<()> {
        (**self).new_window(session, window)
    }
    fn send_keys(&self, target: &str, keys: &[&str]) -> Result<()> {
        (**self).send_keys(target, keys)
    }
    fn set_option(&self, session: &str, option: &str, value: &str) -> Result<()> {
        (**self).set_option(session, option, value)
    }
    fn select_window(&self, target: &str) -> Result<()> {
        (**self).select_window(target)
    }
    fn list_windows(&self, session: &str) -> Result<Vec<String>> {
        (**self).list_windows(session)
    }
    fn capture_pane(&self, target: &str) -> Result<String> {
        (**self).capture_pane(target)
    }
    fn kill_session(&self, session: &str) -> Result<()> {
        (**self).kill_session(session)
    }
    fn pane_pid(&self, target: &str) -> Result<Option<u32>> {
        (**self).pane_pid(target)
    }
}

impl<T: ProcessProbe + ?Sized> ProcessProbe for &T {
    fn is_running(&self, signature: &str) -> Result<bool> {
        (**self).is_running(signature)
    }
    fn child_matching(&self, parent: u32, pattern: &str) -> Result<Option<u32>> {
        (**self).child_matching(parent, pattern)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Unknown,
    Healthy,
    Degraded,
}

/// The named session and its two windows, as last observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSession {
    pub name: String,
    pub renderer_window: String,
    pub controller_window: String,
    pub liveness: Liveness,
}

impl RuntimeSession {
    pub fn renderer_target(&self) -> String {
        target(&self.name, &self.renderer_window)
    }

    pub fn controller_target(&self) -> String {
        target(&self.name, &self.controller_window)
    }
}
