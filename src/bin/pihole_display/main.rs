//! Button controller that runs in the control window of the display session.

use clap::Parser;
use pihole_display::config::{load_settings, ControllerArgs};
use pihole_display::controller;
use pihole_display::telemetry::{
    init_tracing, install_panic_hook, LogRotation, LogTarget, CONTROLLER_LOG_MAX_BYTES,
};
use std::process::ExitCode;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = ControllerArgs::parse();
    let loaded = load_settings(&args.common.config);
    let settings = loaded.settings;

    let target = LogTarget {
        file: (!args.common.stderr_log).then(|| settings.logging.file.clone()),
        level: args
            .common
            .log_level
            .clone()
            .unwrap_or_else(|| settings.logging.level.clone()),
        rotation: LogRotation::LargerThan(CONTROLLER_LOG_MAX_BYTES),
    };
    if let Err(err) = init_tracing(&target) {
        eprintln!("pihole-display: {err:#}; logging to stderr");
        let fallback = LogTarget {
            file: None,
            level: "info".to_string(),
            rotation: target.rotation,
        };
        let _ = init_tracing(&fallback);
    }
    install_panic_hook();

    info!("pihole-display v{} starting", env!("CARGO_PKG_VERSION"));
    match &loaded.source {
        Some(path) => info!("settings loaded from {}", path.display()),
        None => info!("using built-in settings"),
    }
    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    match controller::run(&settings) {
        Ok(()) => {
            info!("controller stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("controller failed: {err:#}");
            eprintln!("pihole-display: {err:#}");
            ExitCode::from(1)
        }
    }
}
