//! Backlight brightness: a discrete level index mapped through a gamma curve
//! onto a PWM duty cycle.

mod pwm;

use crate::config::BrightnessSettings;
use anyhow::Result;
use tracing::debug;

pub use pwm::SysfsPwm;

/// Anything that can drive the backlight with a duty cycle in `0.0..=1.0`.
pub trait Backlight: Send {
    fn set_duty(&mut self, duty: f64) -> Result<()>;

    /// Turn the output off and release the hardware.
    fn shutdown(&mut self) -> Result<()> {
        self.set_duty(0.0)
    }
}

/// `x^gamma`, with zero pinned to exactly zero.
pub fn gamma_correct(fraction: f64, gamma: f64) -> f64 {
    if fraction <= 0.0 {
        return 0.0;
    }
    fraction.min(1.0).powf(gamma)
}

/// Owns the current brightness index and the pre-menu snapshot.
pub struct BrightnessController<B: Backlight> {
    backlight: B,
    gamma: f64,
    /// Duty fractions indexed by level, off first, full last.
    fractions: Vec<f64>,
    level: usize,
    snapshot: Option<usize>,
    applied: Option<usize>,
}

impl<B: Backlight> BrightnessController<B> {
    /// Start at full brightness.
    pub fn new(backlight: B, settings: &BrightnessSettings) -> Result<Self> {
        let mut fractions: Vec<f64> = settings.levels.iter().rev().copied().collect();
        if fractions.len() < 2 {
            fractions = vec![0.0, 1.0];
        }
        let full = fractions.len() - 1;
        let mut controller = Self {
            backlight,
            gamma: settings.gamma,
            fractions,
            level: full,
            snapshot: None,
            applied: None,
        };
        controller.set_level(full)?;
        Ok(controller)
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn full_level(&self) -> usize {
        self.fractions.len() - 1
    }

    pub fn level_count(&self) -> usize {
        self.fractions.len()
    }

    /// Duty cycle for a level; level 0 is always fully off.
    pub fn duty_for(&self, level: usize) -> f64 {
        if level == 0 {
            return 0.0;
        }
        let fraction = self.fractions[level.min(self.full_level())];
        gamma_correct(fraction, self.gamma)
    }

    /// Percentage of the linear fraction, for status messages.
    pub fn percent(&self) -> u32 {
        if self.level == 0 {
            return 0;
        }
        (self.fractions[self.level] * 100.0).round() as u32
    }

    pub fn set_level(&mut self, level: usize) -> Result<()> {
        let level = level.min(self.full_level());
        if self.applied == Some(level) {
            self.level = level;
            return Ok(());
        }
        let duty = self.duty_for(level);
        self.backlight.set_duty(duty)?;
        debug!(level, duty, "backlight level applied");
        self.level = level;
        self.applied = Some(level);
        Ok(())
    }

    /// Step one level dimmer; off wraps back to full.
    pub fn cycle(&mut self) -> Result<usize> {
        let next = if self.level == 0 {
            self.full_level()
        } else {
            self.level - 1
        };
        self.set_level(next)?;
        Ok(next)
    }

    /// Remember the current level (once) and jump to full brightness.
    pub fn force_full(&mut self) -> Result<()> {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.level);
        }
        self.set_level(self.full_level())
    }

    /// Return to the level saved by [`force_full`](Self::force_full), if any.
    pub fn restore(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(level) => self.set_level(level),
            None => Ok(()),
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.applied = None;
        self.backlight.shutdown()
    }

    #[cfg(test)]
    pub(crate) fn backlight(&self) -> &B {
        &self.backlight
    }
}

/// In-memory backlight that records every duty written to it.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingBacklight {
    pub(crate) writes: Vec<f64>,
    pub(crate) shut_down: bool,
}

#[cfg(test)]
impl Backlight for RecordingBacklight {
    fn set_duty(&mut self, duty: f64) -> Result<()> {
        self.writes.push(duty);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.shut_down = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn controller() -> BrightnessController<RecordingBacklight> {
        BrightnessController::new(RecordingBacklight::default(), &Settings::default().brightness)
            .expect("controller")
    }

    #[test]
    fn starts_at_full_brightness() {
        let ctl = controller();
        assert_eq!(ctl.level(), 7);
        assert_eq!(ctl.level_count(), 8);
        assert_eq!(ctl.backlight().writes, vec![1.0]);
    }

    #[test]
    fn level_zero_is_dark_for_any_gamma() {
        for gamma in [0.1, 1.0, 1.8, 5.0] {
            let mut settings = Settings::default().brightness;
            settings.gamma = gamma;
            let ctl = BrightnessController::new(RecordingBacklight::default(), &settings)
                .expect("controller");
            assert_eq!(ctl.duty_for(0), 0.0);
        }
    }

    #[test]
    fn duty_follows_gamma_curve() {
        let ctl = controller();
        let expected = (3.0f64 / 7.0).powf(1.8);
        assert!((ctl.duty_for(3) - expected).abs() < 1e-12);
        assert_eq!(ctl.duty_for(7), 1.0);
    }

    #[test]
    fn eight_cycles_return_to_the_start() {
        let mut ctl = controller();
        ctl.set_level(3).expect("set");
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(ctl.cycle().expect("cycle"));
        }
        assert_eq!(seen, vec![2, 1, 0, 7, 6, 5, 4, 3]);
        assert_eq!(ctl.level(), 3);
    }

    #[test]
    fn press_after_off_returns_to_full() {
        let mut ctl = controller();
        ctl.set_level(0).expect("set");
        assert_eq!(ctl.cycle().expect("cycle"), 7);
        assert_eq!(ctl.backlight().writes.last().copied(), Some(1.0));
    }

    #[test]
    fn repeated_level_is_written_once() {
        let mut ctl = controller();
        ctl.set_level(4).expect("set");
        ctl.set_level(4).expect("set");
        assert_eq!(ctl.backlight().writes.len(), 2);
    }

    #[test]
    fn force_full_then_restore_round_trips_exactly() {
        let mut ctl = controller();
        ctl.set_level(0).expect("set");
        ctl.force_full().expect("force");
        assert_eq!(ctl.level(), 7);
        ctl.force_full().expect("force again keeps first snapshot");
        ctl.restore().expect("restore");
        assert_eq!(ctl.level(), 0);
        assert!(!ctl.has_snapshot());
        ctl.restore().expect("restore without snapshot is a no-op");
        assert_eq!(ctl.level(), 0);
    }

    #[test]
    fn custom_table_is_indexed_from_off_to_full() {
        let mut settings = Settings::default().brightness;
        settings.levels = vec![1.0, 0.5, 0.0];
        settings.gamma = 1.0;
        let mut ctl =
            BrightnessController::new(RecordingBacklight::default(), &settings).expect("ctl");
        assert_eq!(ctl.full_level(), 2);
        assert_eq!(ctl.duty_for(1), 0.5);
        ctl.cycle().expect("cycle");
        assert_eq!(ctl.percent(), 50);
    }

    #[test]
    fn shutdown_reaches_the_hardware() {
        let mut ctl = controller();
        ctl.shutdown().expect("shutdown");
        assert!(ctl.backlight().shut_down);
    }
}
