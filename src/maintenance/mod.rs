//! The fixed catalog of maintenance actions and the worker that runs them.

mod dispatch;
#[cfg(test)]
mod tests;

use crate::config::ActionCommands;
use std::fmt;
use std::time::Duration;

pub use dispatch::{ActionRequest, MaintenanceDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintenanceAction {
    UpdateGravity,
    UpdatePihole,
    UpdatePadd,
    UpdateSystem,
    Reboot,
    Shutdown,
}

/// Rough expected runtime, shown to the user while an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBand {
    Seconds,
    Minutes,
    Long,
}

impl DurationBand {
    pub fn hint(self) -> &'static str {
        match self {
            DurationBand::Seconds => "a few seconds",
            DurationBand::Minutes => "1-3 minutes",
            DurationBand::Long => "several minutes or more",
        }
    }
}

impl MaintenanceAction {
    pub const ALL: [MaintenanceAction; 6] = [
        MaintenanceAction::UpdateGravity,
        MaintenanceAction::UpdatePihole,
        MaintenanceAction::UpdatePadd,
        MaintenanceAction::UpdateSystem,
        MaintenanceAction::Reboot,
        MaintenanceAction::Shutdown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MaintenanceAction::UpdateGravity => "Update Gravity",
            MaintenanceAction::UpdatePihole => "Update Pi-hole",
            MaintenanceAction::UpdatePadd => "Update PADD",
            MaintenanceAction::UpdateSystem => "Update System",
            MaintenanceAction::Reboot => "Reboot",
            MaintenanceAction::Shutdown => "Shutdown",
        }
    }

    /// Configured command line for this action.
    pub fn command_line(self, commands: &ActionCommands) -> &str {
        match self {
            MaintenanceAction::UpdateGravity => &commands.update_gravity,
            MaintenanceAction::UpdatePihole => &commands.update_pihole,
            MaintenanceAction::UpdatePadd => &commands.update_padd,
            MaintenanceAction::UpdateSystem => &commands.update_system,
            MaintenanceAction::Reboot => &commands.reboot,
            MaintenanceAction::Shutdown => &commands.shutdown,
        }
    }

    pub fn duration_band(self) -> DurationBand {
        match self {
            MaintenanceAction::UpdateGravity | MaintenanceAction::UpdatePihole => {
                DurationBand::Minutes
            }
            MaintenanceAction::UpdateSystem => DurationBand::Long,
            MaintenanceAction::UpdatePadd
            | MaintenanceAction::Reboot
            | MaintenanceAction::Shutdown => DurationBand::Seconds,
        }
    }

    pub fn may_require_reboot(self) -> bool {
        matches!(self, MaintenanceAction::UpdateSystem)
    }

    /// The host goes away when this action succeeds, so the dashboard is
    /// never brought back afterwards.
    pub fn ends_session(self) -> bool {
        matches!(self, MaintenanceAction::Reboot | MaintenanceAction::Shutdown)
    }

    /// Runs from the renderer's checkout rather than the controller's cwd.
    pub fn runs_in_renderer_dir(self) -> bool {
        matches!(self, MaintenanceAction::UpdatePadd)
    }
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Success {
        message: String,
    },
    Failure {
        /// `None` when the command never started or was killed by a signal.
        exit_code: Option<i32>,
        last_error_line: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: MaintenanceAction,
    pub status: ActionStatus,
    pub elapsed: Duration,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ActionStatus::Success { .. })
    }

    /// One-line summary for the status panel and the log.
    pub fn summary(&self) -> String {
        match &self.status {
            ActionStatus::Success { message } => message.clone(),
            ActionStatus::Failure {
                exit_code,
                last_error_line,
            } => {
                let mut text = match exit_code {
                    Some(code) => format!("{} failed (exit code {code})", self.action),
                    None => format!("{} failed", self.action),
                };
                if let Some(line) = last_error_line {
                    text.push_str(": ");
                    text.push_str(line);
                }
                text
            }
        }
    }
}
