use super::{ButtonId, GestureClassifier};
use crate::config::ButtonSettings;
use crate::events::{ControllerEvent, EventSender};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysfs_gpio::{Direction, Edge, Pin, PinPoller};
use tracing::{debug, info, warn};

/// Upper bound on how late a hold can be confirmed.
const POLL_TIMEOUT_MS: isize = 20;
/// udev needs a moment to fix permissions on freshly exported pins.
const EXPORT_SETTLE: Duration = Duration::from_millis(100);
const ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// One watcher thread per button, each owning its pin and classifier.
pub struct GpioButtons {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl GpioButtons {
    /// Export and configure every pin and open its edge poller, then start
    /// the watchers. Any pin that cannot be set up fails the whole startup.
    pub fn start(settings: &ButtonSettings, events: EventSender) -> Result<Self> {
        let pins = prepare_pins(settings, configure_pin)?;

        // Built first so an early return stops the watchers already running.
        let mut buttons = Self {
            stop: Arc::new(AtomicBool::new(false)),
            handles: Vec::with_capacity(pins.len()),
        };
        for (button, (pin, poller)) in pins {
            let classifier = GestureClassifier::new(button, settings.debounce, settings.hold);
            let watcher = Watcher {
                pin,
                poller,
                classifier,
                active_low: settings.active_low,
                events: events.clone(),
                stop: Arc::clone(&buttons.stop),
            };
            let handle = thread::Builder::new()
                .name(format!("{button}-watch"))
                .spawn(move || watcher.run())
                .with_context(|| format!("failed to spawn watcher for {button}"))?;
            buttons.handles.push(handle);
        }
        info!(pins = ?settings.pins, "button watchers started");
        Ok(buttons)
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for GpioButtons {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `setup` for every button in order, stopping at the first failure.
fn prepare_pins<T>(
    settings: &ButtonSettings,
    mut setup: impl FnMut(u64) -> Result<T>,
) -> Result<Vec<(ButtonId, T)>> {
    let mut prepared = Vec::with_capacity(ButtonId::ALL.len());
    for button in ButtonId::ALL {
        let number = settings.pins[button.index()];
        let ready =
            setup(number).with_context(|| format!("failed to set up {button} on GPIO {number}"))?;
        prepared.push((button, ready));
    }
    Ok(prepared)
}

fn configure_pin(number: u64) -> Result<(Pin, PinPoller)> {
    let pin = Pin::new(number);
    if !pin.is_exported() {
        pin.export().context("export")?;
        thread::sleep(EXPORT_SETTLE);
    }
    pin.set_direction(Direction::In).context("set direction")?;
    pin.set_edge(Edge::BothEdges).context("set edge")?;
    let poller = pin.get_poller().context("open edge poller")?;
    Ok((pin, poller))
}

struct Watcher {
    pin: Pin,
    poller: PinPoller,
    classifier: GestureClassifier,
    active_low: bool,
    events: EventSender,
    stop: Arc<AtomicBool>,
}

impl Watcher {
    fn run(mut self) {
        let button = self.classifier.button();
        while !self.stop.load(Ordering::SeqCst) {
            let value = match self.poller.poll(POLL_TIMEOUT_MS) {
                Ok(Some(value)) => value,
                // Timed out: sample the line anyway so a missed edge heals.
                Ok(None) => match self.pin.get_value() {
                    Ok(value) => value,
                    Err(err) => {
                        warn!("{button}: read failed: {err}");
                        thread::sleep(ERROR_BACKOFF);
                        continue;
                    }
                },
                Err(err) => {
                    warn!("{button}: poll failed: {err}");
                    thread::sleep(ERROR_BACKOFF);
                    continue;
                }
            };
            let pressed = (value == 0) == self.active_low;
            let now = Instant::now();
            for gesture in self.classifier.on_edge(pressed, now) {
                self.post(gesture);
            }
            if let Some(gesture) = self.classifier.poll(now) {
                self.post(gesture);
            }
        }
        if let Err(err) = self.pin.unexport() {
            debug!("{button}: unexport failed: {err}");
        }
    }

    fn post(&self, gesture: super::GestureEvent) {
        debug!(button = %gesture.button, kind = ?gesture.kind, "gesture");
        self.events.post(ControllerEvent::Gesture(gesture));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use anyhow::bail;

    #[test]
    fn pins_are_prepared_in_button_order() {
        let settings = Settings::default().buttons;
        let prepared = prepare_pins(&settings, Ok).expect("prepare");
        let buttons: Vec<ButtonId> = prepared.iter().map(|(button, _)| *button).collect();
        assert_eq!(buttons, ButtonId::ALL.to_vec());
        assert_eq!(prepared[2].1, 23);
    }

    #[test]
    fn any_pin_failure_fails_startup() {
        let settings = Settings::default().buttons;
        let mut attempted = Vec::new();
        let err = prepare_pins(&settings, |number| {
            attempted.push(number);
            if number == 23 {
                bail!("open edge poller: no such device");
            }
            Ok(number)
        })
        .unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("button3 on GPIO 23"), "{text}");
        assert!(text.contains("open edge poller"), "{text}");
        assert_eq!(attempted, vec![17, 22, 23]);
    }
}
