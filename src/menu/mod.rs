//! Menu modes and the state machine that consumes controller events.

mod machine;
mod panel;

use crate::buttons::ButtonId;
use crate::maintenance::{MaintenanceAction, MaintenanceDispatcher};
use anyhow::Result;

pub use machine::MenuStateMachine;
pub use panel::TerminalPanel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    PiholeUpdate,
    SystemControl,
}

impl MenuKind {
    pub fn title(self) -> &'static str {
        match self {
            MenuKind::PiholeUpdate => "Pi-Hole Update Menu",
            MenuKind::SystemControl => "System Control Menu",
        }
    }

    /// Buttons 2-4 select an action; button 1 cancels.
    pub fn action_for(self, button: ButtonId) -> Option<MaintenanceAction> {
        match (self, button) {
            (MenuKind::PiholeUpdate, ButtonId::Button2) => Some(MaintenanceAction::UpdateGravity),
            (MenuKind::PiholeUpdate, ButtonId::Button3) => Some(MaintenanceAction::UpdatePihole),
            (MenuKind::PiholeUpdate, ButtonId::Button4) => Some(MaintenanceAction::UpdatePadd),
            (MenuKind::SystemControl, ButtonId::Button2) => Some(MaintenanceAction::UpdateSystem),
            (MenuKind::SystemControl, ButtonId::Button3) => Some(MaintenanceAction::Reboot),
            (MenuKind::SystemControl, ButtonId::Button4) => Some(MaintenanceAction::Shutdown),
            (_, ButtonId::Button1) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuMode {
    Normal,
    Menu(MenuKind),
    Busy {
        action: MaintenanceAction,
        /// Set by a button1 tap while running; skips the feedback delay.
        acknowledged: bool,
    },
}

/// Starts an action without blocking; completion arrives as an event.
pub trait ActionLauncher {
    fn launch(&mut self, action: MaintenanceAction);
}

impl ActionLauncher for MaintenanceDispatcher {
    fn launch(&mut self, action: MaintenanceAction) {
        self.run(action);
    }
}

/// What the user sees: the controller window's text and which window is in
/// front.
pub trait StatusPanel {
    fn show_menu(&mut self, kind: MenuKind, timeout_secs: u64) -> Result<()>;
    fn show_running(&mut self, action: MaintenanceAction) -> Result<()>;
    fn show_progress(&mut self, action: MaintenanceAction, line: &str) -> Result<()>;
    fn show_message(&mut self, text: &str) -> Result<()>;
    /// Bring the renderer window back to the front.
    fn show_dashboard(&mut self) -> Result<()>;
}
