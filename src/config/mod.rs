//! Settings file resolution and command-line flags for both binaries.
//!
//! The YAML file is optional and every key in it is optional. Anything
//! missing or unusable falls back to the documented default and leaves a
//! [`ConfigWarning`] behind so the caller can log it once logging is up.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Args, Parser};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use defaults::*;
pub use validation::{load_settings, resolve_settings, ConfigWarning, LoadedSettings};

/// Flags shared by the controller and the supervisor.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// Path to the YAML settings file
    #[arg(
        long,
        env = "PIHOLE_DISPLAY_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Override the log level from the settings file (trace|debug|info|warn|error)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Write logs to stderr instead of the configured log file
    #[arg(long = "stderr-log", default_value_t = false)]
    pub stderr_log: bool,
}

/// CLI options for the button controller that runs inside the control window.
#[derive(Debug, Clone, Parser)]
#[command(about = "Pi-hole display button controller", author, version)]
pub struct ControllerArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// CLI options for the boot-time session supervisor.
#[derive(Debug, Clone, Parser)]
#[command(about = "Pi-hole display session supervisor", author, version)]
pub struct SupervisorArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Attach this terminal to the session after it is confirmed healthy
    #[arg(long, default_value_t = false)]
    pub attach: bool,
}

/// Fully resolved settings; every field carries a usable value.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub session: SessionSettings,
    pub renderer: RendererSettings,
    pub controller: ControllerSettings,
    pub brightness: BrightnessSettings,
    pub buttons: ButtonSettings,
    pub timing: TimingSettings,
    pub supervisor: SupervisorSettings,
    pub actions: ActionCommands,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub name: String,
    pub renderer_window: String,
    pub controller_window: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererSettings {
    pub script: PathBuf,
    /// Substring the renderer prints once it is up; `None` skips the check.
    pub banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Optional interpreter placed before the script (empty when the script is executable).
    pub interpreter: Option<String>,
    pub script: PathBuf,
    pub args: Vec<String>,
}

impl ControllerSettings {
    /// Shell line typed into the controller window. The controller is pointed
    /// at `config` unless the configured args already name a settings file.
    pub fn launch_command(&self, config: &Path) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 4);
        if let Some(interpreter) = &self.interpreter {
            words.push(interpreter.clone());
        }
        words.push(self.script.to_string_lossy().to_string());
        let names_config = self
            .args
            .iter()
            .any(|arg| arg == "--config" || arg.starts_with("--config="));
        if !names_config {
            words.push("--config".to_string());
            words.push(config.to_string_lossy().to_string());
        }
        words.extend(self.args.iter().cloned());
        shell_words::join(words)
    }

    /// Pattern the process probe matches against full command lines.
    pub fn launch_signature(&self) -> String {
        self.script.to_string_lossy().to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessSettings {
    pub gamma: f64,
    /// Duty fractions ordered from full brightness down to off.
    pub levels: Vec<f64>,
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    pub period_ns: u64,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSettings {
    pub pins: [u64; 4],
    pub active_low: bool,
    pub debounce: Duration,
    pub hold: Duration,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSettings {
    pub menu_timeout: Duration,
    pub feedback_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub probe_attempts: u32,
    pub poll_interval: Duration,
    pub confirm_delay: Duration,
    pub restart_delay: Duration,
}

/// Raw command lines for each maintenance action, split with shell-words rules at dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCommands {
    pub update_gravity: String,
    pub update_pihole: String,
    pub update_padd: String,
    pub update_system: String,
    pub reboot: String,
    pub shutdown: String,
    pub dns_probe: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub file: PathBuf,
    pub startup_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionSettings {
                name: DEFAULT_SESSION_NAME.to_string(),
                renderer_window: DEFAULT_RENDERER_WINDOW.to_string(),
                controller_window: DEFAULT_CONTROLLER_WINDOW.to_string(),
            },
            renderer: RendererSettings {
                script: PathBuf::from(DEFAULT_RENDERER_SCRIPT),
                banner: None,
            },
            controller: ControllerSettings {
                interpreter: None,
                script: PathBuf::from(DEFAULT_CONTROLLER_SCRIPT),
                args: Vec::new(),
            },
            brightness: BrightnessSettings {
                gamma: DEFAULT_GAMMA,
                levels: default_brightness_levels(),
                pwm_chip: DEFAULT_PWM_CHIP,
                pwm_channel: DEFAULT_PWM_CHANNEL,
                period_ns: DEFAULT_PWM_PERIOD_NS,
                retry_attempts: DEFAULT_PWM_RETRY_ATTEMPTS,
            },
            buttons: ButtonSettings {
                pins: DEFAULT_BUTTON_PINS,
                active_low: true,
                debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
                hold: Duration::from_millis(DEFAULT_HOLD_MS),
                queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            },
            timing: TimingSettings {
                menu_timeout: Duration::from_secs(DEFAULT_MENU_TIMEOUT_SECS),
                feedback_delay: Duration::from_secs(DEFAULT_FEEDBACK_DELAY_SECS),
            },
            supervisor: SupervisorSettings {
                probe_attempts: DEFAULT_PROBE_ATTEMPTS,
                poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
                confirm_delay: Duration::from_millis(DEFAULT_CONFIRM_DELAY_MS),
                restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            },
            actions: ActionCommands {
                update_gravity: DEFAULT_UPDATE_GRAVITY_CMD.to_string(),
                update_pihole: DEFAULT_UPDATE_PIHOLE_CMD.to_string(),
                update_padd: DEFAULT_UPDATE_PADD_CMD.to_string(),
                update_system: DEFAULT_UPDATE_SYSTEM_CMD.to_string(),
                reboot: DEFAULT_REBOOT_CMD.to_string(),
                shutdown: DEFAULT_SHUTDOWN_CMD.to_string(),
                dns_probe: DEFAULT_DNS_PROBE_CMD.to_string(),
            },
            logging: LogSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                file: PathBuf::from(DEFAULT_CONTROLLER_LOG),
                startup_file: PathBuf::from(DEFAULT_STARTUP_LOG),
            },
        }
    }
}
