use super::{target, Liveness, ProcessProbe, RuntimeSession, SessionManager};
use crate::config::{ControllerSettings, RendererSettings, SessionSettings, Settings};
use std::fmt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const VERIFY_ATTEMPTS: u32 = 5;
const VERIFY_INTERVAL: Duration = Duration::from_millis(200);

/// Fatal supervisor conditions. Each one ends the run with exit code 1.
#[derive(Debug)]
pub enum SupervisorError {
    /// The multiplexer or one of the two scripts is not installed.
    MissingDependency(String),
    /// The session could not be created or never became visible.
    SessionCreationFailed(String),
    /// The controller window could not be added to a new session.
    WindowCreationFailed(String),
    /// An existing session lacks one of the expected windows.
    SessionUnhealthy(String),
    /// The controller was not seen once within the probe budget.
    ControllerNeverStarted { attempts: u32 },
    /// The controller was seen but gone again by the confirmation check.
    ControllerCrashLoop,
    /// A multiplexer command failed outside the steps above.
    SessionManager(anyhow::Error),
}

impl SupervisorError {
    /// Every fatal condition exits the same way; the log says which one.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorError::MissingDependency(what) => write!(f, "missing dependency: {what}"),
            SupervisorError::SessionCreationFailed(why) => {
                write!(f, "session creation failed: {why}")
            }
            SupervisorError::WindowCreationFailed(why) => {
                write!(f, "window creation failed: {why}")
            }
            SupervisorError::SessionUnhealthy(why) => write!(f, "session unhealthy: {why}"),
            SupervisorError::ControllerNeverStarted { attempts } => {
                write!(f, "controller never started ({attempts} probe attempts)")
            }
            SupervisorError::ControllerCrashLoop => {
                write!(f, "controller keeps exiting shortly after it starts")
            }
            SupervisorError::SessionManager(err) => write!(f, "session manager error: {err:#}"),
        }
    }
}

impl std::error::Error for SupervisorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorOutcome {
    Created,
    AlreadyHealthy,
    Healed,
}

/// Waits used while creating and probing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTiming {
    pub attempts: u32,
    pub poll_interval: Duration,
    pub confirm_delay: Duration,
    pub restart_delay: Duration,
    pub verify_attempts: u32,
    pub verify_interval: Duration,
}

impl ProbeTiming {
    pub fn from_settings(settings: &Settings) -> Self {
        let supervisor = &settings.supervisor;
        Self {
            attempts: supervisor.probe_attempts.max(1),
            poll_interval: supervisor.poll_interval,
            confirm_delay: supervisor.confirm_delay,
            restart_delay: supervisor.restart_delay,
            verify_attempts: VERIFY_ATTEMPTS,
            verify_interval: VERIFY_INTERVAL,
        }
    }

    #[cfg(test)]
    pub(crate) fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            poll_interval: Duration::ZERO,
            confirm_delay: Duration::ZERO,
            restart_delay: Duration::ZERO,
            verify_attempts: VERIFY_ATTEMPTS,
            verify_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeResult {
    Alive,
    NeverSeen,
    /// Seen once but gone by the confirmation check.
    DiedAfterStart,
}

/// Kills a half-built session unless disarmed.
struct SessionCleanup<'a, M: SessionManager> {
    manager: &'a M,
    session: &'a str,
    armed: bool,
}

impl<'a, M: SessionManager> SessionCleanup<'a, M> {
    fn new(manager: &'a M, session: &'a str) -> Self {
        Self {
            manager,
            session,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<M: SessionManager> Drop for SessionCleanup<'_, M> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("removing partially created session {}", self.session);
        if let Err(err) = self.manager.kill_session(self.session) {
            error!("failed to remove session {}: {err:#}", self.session);
        }
    }
}

/// Establishes the runtime session, or checks and heals an existing one.
pub struct Supervisor<M: SessionManager, P: ProcessProbe> {
    manager: M,
    probe: P,
    session: SessionSettings,
    renderer: RendererSettings,
    controller: ControllerSettings,
    /// Settings file handed to the controller so both read the same values.
    config: PathBuf,
    timing: ProbeTiming,
}

impl<M: SessionManager, P: ProcessProbe> Supervisor<M, P> {
    pub fn new(manager: M, probe: P, settings: &Settings, config: &Path) -> Self {
        Self {
            manager,
            probe,
            session: settings.session.clone(),
            renderer: settings.renderer.clone(),
            controller: settings.controller.clone(),
            config: config.to_path_buf(),
            timing: ProbeTiming::from_settings(settings),
        }
    }

    pub fn with_timing(mut self, timing: ProbeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn run(&self) -> Result<(SupervisorOutcome, RuntimeSession), SupervisorError> {
        self.preflight()?;
        let name = self.session.name.as_str();
        let exists = self
            .manager
            .has_session(name)
            .map_err(SupervisorError::SessionManager)?;
        let outcome = if exists {
            info!("session {name} already exists; checking health");
            self.check_existing()?
        } else {
            info!("session {name} not found; creating it");
            self.create()?;
            SupervisorOutcome::Created
        };
        let runtime = RuntimeSession {
            name: name.to_string(),
            renderer_window: self.session.renderer_window.clone(),
            controller_window: self.session.controller_window.clone(),
            liveness: Liveness::Healthy,
        };
        Ok((outcome, runtime))
    }

    fn preflight(&self) -> Result<(), SupervisorError> {
        let version = self.manager.version().map_err(|err| {
            SupervisorError::MissingDependency(format!("session manager unavailable: {err:#}"))
        })?;
        info!("session manager: {version}");
        require_file("renderer script", &self.renderer.script)?;
        require_file("controller script", &self.controller.script)?;
        Ok(())
    }

    fn renderer_target(&self) -> String {
        target(&self.session.name, &self.session.renderer_window)
    }

    fn controller_target(&self) -> String {
        target(&self.session.name, &self.session.controller_window)
    }

    fn create(&self) -> Result<(), SupervisorError> {
        let name = self.session.name.as_str();
        let renderer_command = shell_words::quote(&self.renderer.script.to_string_lossy())
            .into_owned();
        self.manager
            .new_session(name, &self.session.renderer_window, &renderer_command)
            .map_err(|err| SupervisorError::SessionCreationFailed(format!("{err:#}")))?;
        let cleanup = SessionCleanup::new(&self.manager, name);
        info!(
            "created session {name} with window {} running {renderer_command}",
            self.session.renderer_window
        );

        if !self.verify_session()? {
            return Err(SupervisorError::SessionCreationFailed(format!(
                "session {name} not visible after {} checks",
                self.timing.verify_attempts
            )));
        }
        self.manager
            .set_option(name, "status", "off")
            .map_err(|err| SupervisorError::SessionCreationFailed(format!("{err:#}")))?;

        self.manager
            .new_window(name, &self.session.controller_window)
            .map_err(|err| SupervisorError::WindowCreationFailed(format!("{err:#}")))?;
        info!("created window {}", self.session.controller_window);
        self.launch_controller()?;

        match self.probe_controller() {
            ProbeResult::Alive => info!("controller confirmed running"),
            ProbeResult::NeverSeen => {
                error!("controller never started in the new session");
                return Err(SupervisorError::ControllerNeverStarted {
                    attempts: self.timing.attempts,
                });
            }
            ProbeResult::DiedAfterStart => {
                error!("controller started but exited in the new session");
                return Err(SupervisorError::ControllerCrashLoop);
            }
        }

        self.check_banner();
        self.manager
            .select_window(&self.renderer_target())
            .map_err(SupervisorError::SessionManager)?;
        self.log_windows();
        cleanup.disarm();
        Ok(())
    }

    fn verify_session(&self) -> Result<bool, SupervisorError> {
        for attempt in 1..=self.timing.verify_attempts {
            if self
                .manager
                .has_session(&self.session.name)
                .map_err(SupervisorError::SessionManager)?
            {
                return Ok(true);
            }
            debug!("session not visible yet (check {attempt})");
            thread::sleep(self.timing.verify_interval);
        }
        Ok(false)
    }

    fn launch_controller(&self) -> Result<(), SupervisorError> {
        let command = self.controller.launch_command(&self.config);
        self.manager
            .send_keys(&self.controller_target(), &[command.as_str(), "Enter"])
            .map_err(SupervisorError::SessionManager)?;
        info!("launched controller: {command}");
        Ok(())
    }

    fn check_existing(&self) -> Result<SupervisorOutcome, SupervisorError> {
        let windows = self
            .manager
            .list_windows(&self.session.name)
            .map_err(|err| SupervisorError::SessionUnhealthy(format!("{err:#}")))?;
        for window in [&self.session.renderer_window, &self.session.controller_window] {
            if !windows.iter().any(|name| name == window) {
                return Err(SupervisorError::SessionUnhealthy(format!(
                    "window {window} missing (found: {})",
                    windows.join(", ")
                )));
            }
        }

        if self.probe_controller() == ProbeResult::Alive {
            info!("existing session is healthy");
            return Ok(SupervisorOutcome::AlreadyHealthy);
        }

        warn!("controller not running; restarting it once");
        self.manager
            .send_keys(&self.controller_target(), &["C-c"])
            .map_err(SupervisorError::SessionManager)?;
        thread::sleep(self.timing.restart_delay);
        self.launch_controller()?;

        match self.probe_controller() {
            ProbeResult::Alive => {
                info!("controller restarted");
                Ok(SupervisorOutcome::Healed)
            }
            ProbeResult::NeverSeen => {
                error!("controller never started after restart");
                Err(SupervisorError::ControllerNeverStarted {
                    attempts: self.timing.attempts,
                })
            }
            ProbeResult::DiedAfterStart => {
                error!("controller died after starting again");
                Err(SupervisorError::ControllerCrashLoop)
            }
        }
    }

    /// Two consecutive positive checks, `confirm_delay` apart, count as alive.
    fn probe_controller(&self) -> ProbeResult {
        let signature = self.controller.launch_signature();
        let mut seen = false;
        for attempt in 1..=self.timing.attempts {
            if self.is_running(&signature) {
                seen = true;
                thread::sleep(self.timing.confirm_delay);
                if self.is_running(&signature) {
                    return ProbeResult::Alive;
                }
                warn!("controller exited right after it was seen (attempt {attempt})");
            } else {
                debug!("controller not running yet (attempt {attempt})");
            }
            if attempt < self.timing.attempts {
                thread::sleep(self.timing.poll_interval);
            }
        }
        if seen {
            ProbeResult::DiedAfterStart
        } else {
            ProbeResult::NeverSeen
        }
    }

    fn is_running(&self, signature: &str) -> bool {
        match self.probe.is_running(signature) {
            Ok(running) => running,
            Err(err) => {
                warn!("process probe failed: {err:#}");
                false
            }
        }
    }

    fn check_banner(&self) {
        let Some(banner) = self.renderer.banner.as_deref() else {
            return;
        };
        match self.manager.capture_pane(&self.renderer_target()) {
            Ok(screen) if screen.contains(banner) => info!("renderer banner found"),
            Ok(_) => warn!("renderer banner '{banner}' not on screen yet"),
            Err(err) => warn!("could not capture renderer window: {err:#}"),
        }
    }

    fn log_windows(&self) {
        match self.manager.list_windows(&self.session.name) {
            Ok(windows) => info!("session windows: {}", windows.join(", ")),
            Err(err) => warn!("could not list windows: {err:#}"),
        }
    }
}

fn require_file(label: &str, path: &Path) -> Result<(), SupervisorError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SupervisorError::MissingDependency(format!(
            "{label} not found at {}",
            path.display()
        )))
    }
}
