use super::{ActionLauncher, MenuKind, MenuMode, StatusPanel};
use crate::backlight::{Backlight, BrightnessController};
use crate::buttons::{ButtonId, GestureEvent, GestureKind};
use crate::config::TimingSettings;
use crate::events::ControllerEvent;
use crate::maintenance::{ActionOutcome, MaintenanceAction};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Single consumer of the controller's event queue.
///
/// Time only enters through the `Instant`s passed in, so every transition
/// (including timeouts) can be replayed deterministically.
pub struct MenuStateMachine<B: Backlight, L: ActionLauncher, P: StatusPanel> {
    brightness: BrightnessController<B>,
    launcher: L,
    panel: P,
    timing: TimingSettings,
    mode: MenuMode,
    menu_deadline: Option<Instant>,
    dashboard_deadline: Option<Instant>,
}

impl<B: Backlight, L: ActionLauncher, P: StatusPanel> MenuStateMachine<B, L, P> {
    pub fn new(
        brightness: BrightnessController<B>,
        launcher: L,
        panel: P,
        timing: TimingSettings,
    ) -> Self {
        Self {
            brightness,
            launcher,
            panel,
            timing,
            mode: MenuMode::Normal,
            menu_deadline: None,
            dashboard_deadline: None,
        }
    }

    pub fn mode(&self) -> MenuMode {
        self.mode
    }

    pub fn brightness(&self) -> &BrightnessController<B> {
        &self.brightness
    }

    pub fn brightness_mut(&mut self) -> &mut BrightnessController<B> {
        &mut self.brightness
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    #[cfg(test)]
    pub(crate) fn panel(&self) -> &P {
        &self.panel
    }

    /// Earliest pending timeout, so the caller knows how long it may block.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.menu_deadline, self.dashboard_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn handle(&mut self, event: ControllerEvent, now: Instant) {
        match event {
            ControllerEvent::Gesture(gesture) => self.on_gesture(gesture, now),
            ControllerEvent::ActionProgress { action, line } => match self.mode {
                MenuMode::Busy { action: running, .. } if running == action => {
                    self.panel_call(|panel| panel.show_progress(action, &line));
                }
                _ => debug!("ignoring stale progress from {action}"),
            },
            ControllerEvent::ActionCompleted(outcome) => self.on_completed(outcome, now),
        }
    }

    /// Fire every deadline that is due at `now`.
    pub fn tick(&mut self, now: Instant) {
        if self.menu_deadline.is_some_and(|deadline| deadline <= now) {
            self.menu_deadline = None;
            if let MenuMode::Menu(kind) = self.mode {
                info!("{} timed out", kind.title());
                self.leave_menu("Selection timed out", now);
            }
        }
        if self.dashboard_deadline.is_some_and(|deadline| deadline <= now) {
            self.dashboard_deadline = None;
            self.panel_call(|panel| panel.show_dashboard());
        }
    }

    fn on_gesture(&mut self, gesture: GestureEvent, now: Instant) {
        let GestureEvent { button, kind, .. } = gesture;
        match (self.mode, button, kind) {
            (MenuMode::Normal, ButtonId::Button1, GestureKind::Tap) => {
                match self.brightness.cycle() {
                    Ok(level) => {
                        info!(level, "brightness stepped to {}%", self.brightness.percent())
                    }
                    Err(err) => warn!("brightness change failed: {err:#}"),
                }
            }
            (MenuMode::Normal, ButtonId::Button1, GestureKind::HoldConfirmed) => {
                self.open_menu(MenuKind::PiholeUpdate, now);
            }
            (MenuMode::Normal, ButtonId::Button2, GestureKind::HoldConfirmed) => {
                self.open_menu(MenuKind::SystemControl, now);
            }
            (MenuMode::Menu(_), ButtonId::Button1, GestureKind::Tap) => {
                info!("menu cancelled");
                self.leave_menu("Cancelled", now);
            }
            (MenuMode::Menu(menu), button, GestureKind::Tap) => {
                if let Some(action) = menu.action_for(button) {
                    self.start_action(action);
                }
            }
            (
                MenuMode::Busy {
                    action,
                    acknowledged: false,
                },
                ButtonId::Button1,
                GestureKind::Tap,
            ) => {
                info!("{action} acknowledged; returning to the dashboard when it finishes");
                self.mode = MenuMode::Busy {
                    action,
                    acknowledged: true,
                };
            }
            (mode, button, kind) => debug!(?mode, "ignoring {kind:?} on {button}"),
        }
    }

    fn open_menu(&mut self, kind: MenuKind, now: Instant) {
        info!("opening {}", kind.title());
        self.dashboard_deadline = None;
        if let Err(err) = self.brightness.force_full() {
            warn!("could not raise brightness for menu: {err:#}");
        }
        self.mode = MenuMode::Menu(kind);
        self.menu_deadline = Some(now + self.timing.menu_timeout);
        let timeout_secs = self.timing.menu_timeout.as_secs();
        self.panel_call(|panel| panel.show_menu(kind, timeout_secs));
    }

    fn leave_menu(&mut self, message: &str, now: Instant) {
        self.menu_deadline = None;
        self.mode = MenuMode::Normal;
        self.restore_brightness();
        self.panel_call(|panel| panel.show_message(message));
        self.dashboard_deadline = Some(now + self.timing.feedback_delay);
    }

    fn start_action(&mut self, action: MaintenanceAction) {
        info!("{action} selected");
        self.menu_deadline = None;
        self.mode = MenuMode::Busy {
            action,
            acknowledged: false,
        };
        self.panel_call(|panel| panel.show_running(action));
        self.launcher.launch(action);
    }

    fn on_completed(&mut self, outcome: ActionOutcome, now: Instant) {
        let acknowledged = match self.mode {
            MenuMode::Busy {
                action,
                acknowledged,
            } if action == outcome.action => acknowledged,
            mode => {
                warn!(
                    ?mode,
                    "completion of {} arrived while not running it",
                    outcome.action
                );
                return;
            }
        };
        self.mode = MenuMode::Normal;
        self.restore_brightness();
        let summary = outcome.summary();
        self.panel_call(|panel| panel.show_message(&summary));

        if outcome.action.ends_session() && outcome.is_success() {
            debug!("{} ends the session; dashboard stays hidden", outcome.action);
            return;
        }
        if acknowledged {
            self.panel_call(|panel| panel.show_dashboard());
        } else {
            self.dashboard_deadline = Some(now + self.timing.feedback_delay);
        }
    }

    fn restore_brightness(&mut self) {
        if let Err(err) = self.brightness.restore() {
            warn!("could not restore brightness: {err:#}");
        }
    }

    fn panel_call(&mut self, call: impl FnOnce(&mut P) -> anyhow::Result<()>) {
        if let Err(err) = call(&mut self.panel) {
            warn!("status panel update failed: {err:#}");
        }
    }
}
