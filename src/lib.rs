//! Button-driven control surface for a Pi-hole status display.
//!
//! Two binaries share this crate: `pihole-session` builds or heals the tmux
//! session at boot, and `pihole-display` runs inside that session turning
//! button gestures into brightness changes and maintenance actions.

pub mod backlight;
pub mod buttons;
pub mod config;
pub mod controller;
pub mod events;
mod lock;
pub mod maintenance;
pub mod menu;
pub mod session;
pub mod telemetry;
