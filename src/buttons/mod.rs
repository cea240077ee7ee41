//! Button input: raw edges in, classified gestures out.
//!
//! Each physical button gets its own [`GestureClassifier`]. The GPIO layer
//! feeds it level changes and periodic ticks; whatever gestures come out are
//! posted to the controller's event queue. Nothing here touches brightness
//! or menus.

mod classifier;
mod gpio;

use std::fmt;
use std::time::Instant;

pub use classifier::GestureClassifier;
pub use gpio::GpioButtons;

/// One of the four buttons along the display edge, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    Button1,
    Button2,
    Button3,
    Button4,
}

impl ButtonId {
    pub const ALL: [ButtonId; 4] = [
        ButtonId::Button1,
        ButtonId::Button2,
        ButtonId::Button3,
        ButtonId::Button4,
    ];

    pub fn index(self) -> usize {
        match self {
            ButtonId::Button1 => 0,
            ButtonId::Button2 => 1,
            ButtonId::Button3 => 2,
            ButtonId::Button4 => 3,
        }
    }

    pub fn number(self) -> usize {
        self.index() + 1
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "button{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Released before the hold threshold.
    Tap,
    /// Still pressed when the hold threshold elapsed.
    HoldConfirmed,
    /// Released after a confirmed hold.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureEvent {
    pub button: ButtonId,
    pub kind: GestureKind,
    pub at: Instant,
}

impl GestureEvent {
    pub fn new(button: ButtonId, kind: GestureKind, at: Instant) -> Self {
        Self { button, kind, at }
    }
}
