use super::{ButtonId, GestureEvent, GestureKind};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Contact {
    Released,
    Pressed { since: Instant, hold_fired: bool },
}

/// Turns the raw level history of one button into gestures.
///
/// Pure and clock-free: callers pass the instant of every edge and of every
/// periodic tick, so tests can drive it with synthetic timelines.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    button: ButtonId,
    debounce: Duration,
    hold: Duration,
    contact: Contact,
    last_transition: Option<Instant>,
}

impl GestureClassifier {
    pub fn new(button: ButtonId, debounce: Duration, hold: Duration) -> Self {
        Self {
            button,
            debounce,
            hold,
            contact: Contact::Released,
            last_transition: None,
        }
    }

    pub fn button(&self) -> ButtonId {
        self.button
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self.contact, Contact::Pressed { .. })
    }

    /// Feed a level change. Edges inside the debounce window of the previous
    /// accepted transition are ignored, as are edges that do not change state.
    pub fn on_edge(&mut self, pressed: bool, at: Instant) -> Vec<GestureEvent> {
        if pressed == self.is_pressed() {
            return Vec::new();
        }
        if let Some(last) = self.last_transition {
            if at.saturating_duration_since(last) < self.debounce {
                return Vec::new();
            }
        }
        self.last_transition = Some(at);

        match self.contact {
            Contact::Released => {
                self.contact = Contact::Pressed {
                    since: at,
                    hold_fired: false,
                };
                Vec::new()
            }
            Contact::Pressed { since, hold_fired } => {
                self.contact = Contact::Released;
                if hold_fired {
                    vec![self.gesture(GestureKind::Release, at)]
                } else if at.saturating_duration_since(since) >= self.hold {
                    // The tick that should have confirmed the hold never came.
                    vec![
                        self.gesture(GestureKind::HoldConfirmed, at),
                        self.gesture(GestureKind::Release, at),
                    ]
                } else {
                    vec![self.gesture(GestureKind::Tap, at)]
                }
            }
        }
    }

    /// Fire the hold gesture once the button has been down long enough.
    pub fn poll(&mut self, now: Instant) -> Option<GestureEvent> {
        match self.contact {
            Contact::Pressed {
                since,
                hold_fired: false,
            } if now.saturating_duration_since(since) >= self.hold => {
                self.contact = Contact::Pressed {
                    since,
                    hold_fired: true,
                };
                Some(self.gesture(GestureKind::HoldConfirmed, now))
            }
            _ => None,
        }
    }

    fn gesture(&self, kind: GestureKind, at: Instant) -> GestureEvent {
        GestureEvent::new(self.button, kind, at)
    }
}
