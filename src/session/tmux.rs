use super::SessionManager;
use anyhow::{anyhow, bail, Context, Result};
use std::process::{Command, ExitStatus, Output, Stdio};
use tracing::debug;

/// [`SessionManager`] backed by the `tmux` command line.
#[derive(Debug, Clone)]
pub struct TmuxSessionManager {
    program: String,
}

impl Default for TmuxSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxSessionManager {
    pub fn new() -> Self {
        Self {
            program: "tmux".to_string(),
        }
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!("running {} {}", self.program, shell_words::join(args));
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to run {}", self.program))
    }

    /// Run and require success; stdout is returned trimmed.
    fn checked(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} {} failed ({}): {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Hand the current terminal to the session until the user detaches.
    pub fn attach(&self, session: &str) -> Result<ExitStatus> {
        Command::new(&self.program)
            .args(["attach-session", "-t", session])
            .status()
            .with_context(|| format!("failed to attach to session {session}"))
    }
}

impl SessionManager for TmuxSessionManager {
    fn version(&self) -> Result<String> {
        self.checked(&["-V"])
    }

    fn has_session(&self, session: &str) -> Result<bool> {
        let output = self.output(&["has-session", "-t", session])?;
        Ok(output.status.success())
    }

    fn new_session(&self, session: &str, window: &str, command: &str) -> Result<()> {
        self.checked(&["new-session", "-d", "-s", session, "-n", window, command])
            .map(|_| ())
    }

    fn new_window(&self, session: &str, window: &str) -> Result<()> {
        self.checked(&["new-window", "-d", "-t", session, "-n", window])
            .map(|_| ())
    }

    fn send_keys(&self, target: &str, keys: &[&str]) -> Result<()> {
        let mut args = vec!["send-keys", "-t", target];
        args.extend_from_slice(keys);
        self.checked(&args).map(|_| ())
    }

    fn set_option(&self, session: &str, option: &str, value: &str) -> Result<()> {
        self.checked(&["set-option", "-t", session, option, value])
            .map(|_| ())
    }

    fn select_window(&self, target: &str) -> Result<()> {
        self.checked(&["select-window", "-t", target]).map(|_| ())
    }

    fn list_windows(&self, session: &str) -> Result<Vec<String>> {
        let listing = self.checked(&["list-windows", "-t", session, "-F", "#{window_name}"])?;
        Ok(listing.lines().map(str::to_string).collect())
    }

    fn capture_pane(&self, target: &str) -> Result<String> {
        self.checked(&["capture-pane", "-p", "-t", target])
    }

    fn kill_session(&self, session: &str) -> Result<()> {
        self.checked(&["kill-session", "-t", session]).map(|_| ())
    }

    fn pane_pid(&self, target: &str) -> Result<Option<u32>> {
        let listing = self.checked(&["list-panes", "-t", target, "-F", "#{pane_pid}"])?;
        match listing.lines().next() {
            Some(line) => line
                .trim()
                .parse()
                .map(Some)
                .map_err(|err| anyhow!("unexpected pane pid '{line}': {err}")),
            None => Ok(None),
        }
    }
}
