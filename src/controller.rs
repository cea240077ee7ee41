//! The controller process: hardware up, then one actor loop feeding queued
//! events and deadlines into the menu state machine until a stop signal.

use crate::backlight::{Backlight, BrightnessController, SysfsPwm};
use crate::buttons::GpioButtons;
use crate::config::Settings;
use crate::events::{event_queue, ControllerEvent, EventReceiver};
use crate::maintenance::MaintenanceDispatcher;
use crate::menu::{ActionLauncher, MenuStateMachine, StatusPanel, TerminalPanel};
use crate::session::{Liveness, PgrepProbe, RuntimeSession, SessionManager, TmuxSessionManager};
use anyhow::{anyhow, bail, Context, Result};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Longest the loop blocks before re-checking the stop flag.
const IDLE_WAIT: Duration = Duration::from_millis(50);

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Only touches an atomic, which is async-signal-safe.
extern "C" fn handle_shutdown(_: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn install_shutdown_handlers() -> Result<()> {
    for signal in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            // SAFETY: handle_shutdown only stores to an atomic flag.
            let handler = handle_shutdown as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                return Err(anyhow!("failed to install handler for signal {signal}"));
            }
        }
    }
    Ok(())
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Drain events and fire deadlines until `should_stop` says otherwise.
pub fn run_event_loop<B, L, P>(
    machine: &mut MenuStateMachine<B, L, P>,
    events: &EventReceiver,
    mut should_stop: impl FnMut() -> bool,
) where
    B: Backlight,
    L: ActionLauncher,
    P: StatusPanel,
{
    while !should_stop() {
        while let Some(event) = events.try_next() {
            deliver(machine, event);
        }
        let now = Instant::now();
        machine.tick(now);
        let wait = machine
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT);
        if let Some(event) = events.next_timeout(wait) {
            deliver(machine, event);
        }
    }
}

/// Gestures are applied at the instant they happened, so a press made just
/// before a timeout still counts even when it is dequeued after it.
fn deliver<B, L, P>(machine: &mut MenuStateMachine<B, L, P>, event: ControllerEvent)
where
    B: Backlight,
    L: ActionLauncher,
    P: StatusPanel,
{
    let at = match &event {
        ControllerEvent::Gesture(gesture) => gesture.at,
        ControllerEvent::ActionProgress { .. } | ControllerEvent::ActionCompleted(_) => {
            Instant::now()
        }
    };
    machine.tick(at);
    machine.handle(event, at);
}

/// Entry point for the controller binary once settings and logging are up.
pub fn run(settings: &Settings) -> Result<()> {
    let manager = TmuxSessionManager::new();
    let name = settings.session.name.as_str();
    let present = manager
        .has_session(name)
        .context("could not query the session manager")?;
    if !present {
        bail!("session {name} does not exist; start it with the session supervisor");
    }
    install_shutdown_handlers()?;

    let pwm = SysfsPwm::open(&settings.brightness)?;
    let brightness = BrightnessController::new(pwm, &settings.brightness)?;
    info!(
        "backlight ready at level {} of {}",
        brightness.level(),
        brightness.full_level()
    );

    let (sender, receiver) = event_queue(settings.buttons.queue_capacity);
    let mut buttons = GpioButtons::start(&settings.buttons, sender.clone())?;
    let dispatcher =
        MaintenanceDispatcher::new(settings.actions.clone(), &settings.renderer.script, sender);

    let session = RuntimeSession {
        name: name.to_string(),
        renderer_window: settings.session.renderer_window.clone(),
        controller_window: settings.session.controller_window.clone(),
        liveness: Liveness::Healthy,
    };
    let renderer_pattern = settings
        .renderer
        .script
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| settings.renderer.script.to_string_lossy().to_string());
    let panel = TerminalPanel::new(io::stdout(), manager, PgrepProbe, session, renderer_pattern);
    let mut machine =
        MenuStateMachine::new(brightness, dispatcher, panel, settings.timing.clone());

    info!("controller running");
    run_event_loop(&mut machine, &receiver, shutdown_requested);
    info!("shutdown requested");

    buttons.stop();
    if receiver.dropped() > 0 {
        warn!("{} events were dropped while the queue was full", receiver.dropped());
    }
    if let Err(err) = machine.brightness_mut().shutdown() {
        error!("failed to turn the backlight off: {err:#}");
    }
    Ok(())
}
