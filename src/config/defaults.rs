/// Settings file read when neither `--config` nor the env override is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pihole-display/config.yaml";

pub const DEFAULT_SESSION_NAME: &str = "display";
pub const DEFAULT_RENDERER_WINDOW: &str = "padd";
pub const DEFAULT_CONTROLLER_WINDOW: &str = "control";

pub const DEFAULT_RENDERER_SCRIPT: &str = "/opt/padd/padd.sh";
pub const DEFAULT_CONTROLLER_SCRIPT: &str = "/usr/local/bin/pihole-display";

/// Perceptual exponent applied to the linear brightness fraction.
pub const DEFAULT_GAMMA: f64 = 1.8;
pub const DEFAULT_BRIGHTNESS_STEPS: usize = 8;
pub const DEFAULT_PWM_CHIP: u32 = 0;
pub const DEFAULT_PWM_CHANNEL: u32 = 0;
/// 1 kHz keeps the backlight flicker-free without stressing the driver.
pub const DEFAULT_PWM_PERIOD_NS: u64 = 1_000_000;
pub const DEFAULT_PWM_RETRY_ATTEMPTS: u32 = 3;

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_HOLD_MS: u64 = 2_000;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 32;
/// BCM numbering, top to bottom along the display edge.
pub const DEFAULT_BUTTON_PINS: [u64; 4] = [17, 22, 23, 27];

pub const DEFAULT_MENU_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FEEDBACK_DELAY_SECS: u64 = 3;

pub const DEFAULT_PROBE_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_CONFIRM_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RESTART_DELAY_MS: u64 = 2_000;

pub const DEFAULT_UPDATE_GRAVITY_CMD: &str = "sudo pihole -g";
pub const DEFAULT_UPDATE_PIHOLE_CMD: &str = "sudo pihole -up";
pub const DEFAULT_UPDATE_PADD_CMD: &str = "git pull";
pub const DEFAULT_UPDATE_SYSTEM_CMD: &str =
    "sudo sh -c \"apt-get update && apt-get -y full-upgrade\"";
pub const DEFAULT_REBOOT_CMD: &str = "sudo reboot";
pub const DEFAULT_SHUTDOWN_CMD: &str = "sudo shutdown -h now";
pub const DEFAULT_DNS_PROBE_CMD: &str =
    "dig +short +time=1 +tries=1 chaos txt local.api.ftl @localhost";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CONTROLLER_LOG: &str = "/var/log/pihole-display/controller.log";
pub const DEFAULT_STARTUP_LOG: &str = "/var/log/pihole-display/startup.log";

pub(super) const MIN_QUEUE_CAPACITY: usize = 4;
pub(super) const MAX_QUEUE_CAPACITY: usize = 1024;
pub(super) const MAX_GAMMA: f64 = 5.0;
pub(super) const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Evenly spaced duty fractions ordered from full brightness down to off.
pub fn default_brightness_levels() -> Vec<f64> {
    let top = (DEFAULT_BRIGHTNESS_STEPS - 1) as f64;
    (0..DEFAULT_BRIGHTNESS_STEPS)
        .map(|step| (top - step as f64) / top)
        .collect()
}
