//! Boot-time supervisor: makes sure the display session exists and the
//! controller inside it is alive, then exits.

use clap::Parser;
use pihole_display::config::{load_settings, SupervisorArgs};
use pihole_display::session::{PgrepProbe, Supervisor, SupervisorOutcome, TmuxSessionManager};
use pihole_display::telemetry::{init_tracing, install_panic_hook, LogRotation, LogTarget};
use std::process::ExitCode;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = SupervisorArgs::parse();
    let loaded = load_settings(&args.common.config);
    let settings = loaded.settings;

    let target = LogTarget {
        file: (!args.common.stderr_log).then(|| settings.logging.startup_file.clone()),
        level: args
            .common
            .log_level
            .clone()
            .unwrap_or_else(|| settings.logging.level.clone()),
        rotation: LogRotation::EveryRun,
    };
    if let Err(err) = init_tracing(&target) {
        eprintln!("pihole-session: {err:#}; logging to stderr");
        let fallback = LogTarget {
            file: None,
            level: "info".to_string(),
            rotation: target.rotation,
        };
        let _ = init_tracing(&fallback);
    }
    install_panic_hook();

    info!("pihole-session v{} starting", env!("CARGO_PKG_VERSION"));
    match &loaded.source {
        Some(path) => info!("settings loaded from {}", path.display()),
        None => info!("using built-in settings"),
    }
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    info!(
        session = %settings.session.name,
        renderer = %settings.renderer.script.display(),
        controller = %settings.controller.launch_command(&args.common.config),
        "resolved session layout"
    );

    let supervisor = Supervisor::new(
        TmuxSessionManager::new(),
        PgrepProbe,
        &settings,
        &args.common.config,
    );
    let runtime = match supervisor.run() {
        Ok((outcome, runtime)) => {
            let summary = match outcome {
                SupervisorOutcome::Created => "session created",
                SupervisorOutcome::AlreadyHealthy => "session already healthy",
                SupervisorOutcome::Healed => "session healed",
            };
            info!("{summary}; exit code 0");
            runtime
        }
        Err(err) => {
            let code = err.exit_code();
            error!("{err}; exit code {code}");
            eprintln!("pihole-session: {err}");
            return ExitCode::from(code);
        }
    };

    if args.attach {
        info!("attaching to session {}", runtime.name);
        if let Err(err) = supervisor.manager().attach(&runtime.name) {
            error!("{err:#}");
            eprintln!("pihole-session: {err:#}");
        }
    }
    ExitCode::SUCCESS
}
