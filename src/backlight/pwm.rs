use super::Backlight;
use crate::config::BrightnessSettings;
use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tracing::{info, warn};

const PWM_ROOT: &str = "/sys/class/pwm";
const EXPORT_SETTLE: Duration = Duration::from_millis(100);
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Hardware PWM channel driven through the kernel's sysfs interface.
#[derive(Debug)]
pub struct SysfsPwm {
    channel_dir: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    /// Export and enable the configured channel, retrying a few times because
    /// the PWM overlay can still be settling right after boot.
    pub fn open(settings: &BrightnessSettings) -> Result<Self> {
        Self::open_at(Path::new(PWM_ROOT), settings, RETRY_DELAY)
    }

    pub(crate) fn open_at(
        root: &Path,
        settings: &BrightnessSettings,
        retry_delay: Duration,
    ) -> Result<Self> {
        let chip_dir = root.join(format!("pwmchip{}", settings.pwm_chip));
        let attempts = settings.retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            info!(
                chip = settings.pwm_chip,
                channel = settings.pwm_channel,
                "initializing backlight PWM (attempt {attempt}/{attempts})"
            );
            match Self::try_open(&chip_dir, settings) {
                Ok(pwm) => return Ok(pwm),
                Err(err) => {
                    warn!("backlight PWM attempt {attempt} failed: {err:#}");
                    last_err = Some(err);
                    if attempt < attempts {
                        thread::sleep(retry_delay);
                    }
                }
            }
        }
        match last_err {
            Some(err) => Err(err.context(format!(
                "failed to initialize backlight PWM after {attempts} attempts"
            ))),
            None => bail!("backlight PWM was never attempted"),
        }
    }

    fn try_open(chip_dir: &Path, settings: &BrightnessSettings) -> Result<Self> {
        if !chip_dir.is_dir() {
            bail!("'{}' does not exist", chip_dir.display());
        }
        let channel_dir = chip_dir.join(format!("pwm{}", settings.pwm_channel));
        if !channel_dir.is_dir() {
            write_attr(&chip_dir.join("export"), &settings.pwm_channel.to_string())?;
            thread::sleep(EXPORT_SETTLE);
        }
        let pwm = Self {
            channel_dir,
            period_ns: settings.period_ns,
        };
        // The kernel rejects a period shorter than the current duty cycle.
        write_attr(&pwm.attr("duty_cycle"), "0")?;
        write_attr(&pwm.attr("period"), &pwm.period_ns.to_string())?;
        write_attr(&pwm.attr("enable"), "1")?;
        Ok(pwm)
    }

    fn attr(&self, name: &str) -> PathBuf {
        self.channel_dir.join(name)
    }

    /// Duty fraction converted to nanoseconds of the configured period.
    pub fn duty_ns(&self, duty: f64) -> u64 {
        let clamped = duty.clamp(0.0, 1.0);
        (clamped * self.period_ns as f64).round() as u64
    }
}

impl Backlight for SysfsPwm {
    fn set_duty(&mut self, duty: f64) -> Result<()> {
        write_attr(&self.attr("duty_cycle"), &self.duty_ns(duty).to_string())
    }

    fn shutdown(&mut self) -> Result<()> {
        info!("turning backlight off");
        write_attr(&self.attr("duty_cycle"), "0")?;
        write_attr(&self.attr("enable"), "0")
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value)
        .with_context(|| format!("failed to write '{value}' to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn fake_sysfs(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let root = env::temp_dir().join(format!(
            "pihole_display_pwm_{label}_{}_{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(root.join("pwmchip0/pwm0")).expect("create fake pwm");
        root
    }

    #[test]
    fn open_enables_channel_and_writes_scaled_duty() {
        let root = fake_sysfs("open");
        let settings = Settings::default().brightness;
        let mut pwm = SysfsPwm::open_at(&root, &settings, Duration::ZERO).expect("open");
        let channel = root.join("pwmchip0/pwm0");
        assert_eq!(fs::read_to_string(channel.join("period")).unwrap(), "1000000");
        assert_eq!(fs::read_to_string(channel.join("enable")).unwrap(), "1");

        pwm.set_duty(0.25).expect("duty");
        assert_eq!(fs::read_to_string(channel.join("duty_cycle")).unwrap(), "250000");

        pwm.shutdown().expect("shutdown");
        assert_eq!(fs::read_to_string(channel.join("duty_cycle")).unwrap(), "0");
        assert_eq!(fs::read_to_string(channel.join("enable")).unwrap(), "0");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_chip_fails_after_all_attempts() {
        let root = fake_sysfs("missing");
        let mut settings = Settings::default().brightness;
        settings.pwm_chip = 3;
        settings.retry_attempts = 2;
        let err = SysfsPwm::open_at(&root, &settings, Duration::ZERO).unwrap_err();
        assert!(format!("{err:#}").contains("after 2 attempts"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn duty_is_clamped_to_the_period() {
        let pwm = SysfsPwm {
            channel_dir: PathBuf::from("/nonexistent"),
            period_ns: 1000,
        };
        assert_eq!(pwm.duty_ns(1.5), 1000);
        assert_eq!(pwm.duty_ns(-0.5), 0);
    }
}
