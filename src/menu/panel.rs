use super::{MenuKind, StatusPanel};
use crate::maintenance::MaintenanceAction;
use crate::session::{ProcessProbe, RuntimeSession, SessionManager};
use anyhow::{Context, Result};
use std::io::Write;
use tracing::debug;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const INDENT: &str = "    ";

/// Renders into the controller window (the process's own terminal) and
/// flips the session between the controller and renderer windows.
pub struct TerminalPanel<W: Write, M: SessionManager, P: ProcessProbe> {
    out: W,
    manager: M,
    probe: P,
    session: RuntimeSession,
    /// Matched against the renderer's children to find the process to poke.
    renderer_pattern: String,
}

impl<W: Write, M: SessionManager, P: ProcessProbe> TerminalPanel<W, M, P> {
    pub fn new(
        out: W,
        manager: M,
        probe: P,
        session: RuntimeSession,
        renderer_pattern: String,
    ) -> Self {
        Self {
            out,
            manager,
            probe,
            session,
            renderer_pattern,
        }
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &W {
        &self.out
    }

    fn front_controller(&self) -> Result<()> {
        self.manager
            .select_window(&self.session.controller_target())
            .context("failed to show the controller window")
    }

    fn lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            writeln!(self.out, "{INDENT}{line}")?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Nudge the renderer to redraw by sending it SIGWINCH. Best effort.
    fn refresh_renderer(&self) {
        let pane = match self.manager.pane_pid(&self.session.renderer_target()) {
            Ok(Some(pid)) => pid,
            Ok(None) => return,
            Err(err) => {
                debug!("no renderer pane pid: {err:#}");
                return;
            }
        };
        match self.probe.child_matching(pane, &self.renderer_pattern) {
            Ok(Some(pid)) => {
                let Ok(pid) = libc::pid_t::try_from(pid) else {
                    return;
                };
                // SAFETY: kill(2) with a valid signal number has no memory effects.
                let rc = unsafe { libc::kill(pid, libc::SIGWINCH) };
                if rc == 0 {
                    debug!(pid, "sent SIGWINCH to renderer");
                }
            }
            Ok(None) => debug!("renderer process not found under pane {pane}"),
            Err(err) => debug!("renderer lookup failed: {err:#}"),
        }
    }
}

/// Boxed title and the three choices of a menu.
pub(crate) fn menu_lines(kind: MenuKind, timeout_secs: u64) -> Vec<String> {
    let choices: [(&str, &str); 3] = match kind {
        MenuKind::PiholeUpdate => [
            ("Update Gravity", "press to update blocklists"),
            ("Update Pi-hole", "press to update core software"),
            ("Update PADD", "press to update dashboard code"),
        ],
        MenuKind::SystemControl => [
            ("Update System", "press to update OS and system packages"),
            ("Restart System", "press to reboot"),
            ("Shutdown System", "press to shutdown, then power off"),
        ],
    };
    let title = kind.title();
    let width = title.len() + 14;
    let border = format!("+{}+", "-".repeat(width));
    let mut lines = vec![
        border.clone(),
        format!("|{title:^width$}|"),
        border,
        String::new(),
    ];
    for (idx, (label, hint)) in choices.iter().enumerate() {
        lines.push(format!("Button {}: {label}", idx + 2));
        lines.push(format!("- {hint}"));
        lines.push(String::new());
    }
    lines.push(format!("Waiting {timeout_secs}s for selection"));
    lines.push("Button 1 cancels".to_string());
    lines
}

impl<W: Write, M: SessionManager, P: ProcessProbe> StatusPanel for TerminalPanel<W, M, P> {
    fn show_menu(&mut self, kind: MenuKind, timeout_secs: u64) -> Result<()> {
        self.front_controller()?;
        write!(self.out, "{CLEAR_SCREEN}")?;
        self.lines(&menu_lines(kind, timeout_secs))
    }

    fn show_running(&mut self, action: MaintenanceAction) -> Result<()> {
        let mut lines = vec![
            String::new(),
            format!("{action} selected"),
            format!("This usually takes {}.", action.duration_band().hint()),
        ];
        if action.may_require_reboot() {
            lines.push("A reboot may be needed afterwards.".to_string());
        }
        lines.push(String::new());
        self.lines(&lines)
    }

    fn show_progress(&mut self, _action: MaintenanceAction, line: &str) -> Result<()> {
        self.lines(&[line.to_string()])
    }

    fn show_message(&mut self, text: &str) -> Result<()> {
        self.lines(&[String::new(), text.to_string()])
    }

    fn show_dashboard(&mut self) -> Result<()> {
        self.refresh_renderer();
        self.manager
            .select_window(&self.session.renderer_target())
            .context("failed to show the renderer window")
    }
}
