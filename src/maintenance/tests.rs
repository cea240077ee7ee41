use super::{ActionOutcome, ActionStatus, DurationBand, MaintenanceAction, MaintenanceDispatcher};
use crate::config::Settings;
use crate::events::{event_queue, ControllerEvent, EventReceiver};
use std::path::Path;
use std::time::{Duration, Instant};

fn dispatcher_with(
    configure: impl FnOnce(&mut crate::config::ActionCommands),
) -> (MaintenanceDispatcher, EventReceiver) {
    let mut commands = Settings::default().actions;
    configure(&mut commands);
    let (tx, rx) = event_queue(64);
    let dispatcher = MaintenanceDispatcher::new(commands, Path::new("/tmp/padd.sh"), tx)
        .with_dns_recovery(Duration::from_millis(200), Duration::from_millis(50));
    (dispatcher, rx)
}

/// Collect progress lines until the completion arrives.
fn wait_for_outcome(rx: &EventReceiver) -> (Vec<String>, ActionOutcome) {
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut lines = Vec::new();
    while Instant::now() < deadline {
        match rx.next_timeout(Duration::from_millis(50)) {
            Some(ControllerEvent::ActionProgress { line, .. }) => lines.push(line),
            Some(ControllerEvent::ActionCompleted(outcome)) => return (lines, outcome),
            Some(ControllerEvent::Gesture(_)) | None => {}
        }
    }
    panic!("no completion within deadline; saw {lines:?}");
}

#[test]
fn catalog_flags_match_the_action_table() {
    assert!(MaintenanceAction::Reboot.ends_session());
    assert!(MaintenanceAction::Shutdown.ends_session());
    assert!(!MaintenanceAction::UpdateSystem.ends_session());
    assert!(MaintenanceAction::UpdateSystem.may_require_reboot());
    assert_eq!(MaintenanceAction::UpdateSystem.duration_band(), DurationBand::Long);
    assert_eq!(MaintenanceAction::UpdatePadd.duration_band(), DurationBand::Seconds);
    assert_eq!(MaintenanceAction::ALL.len(), 6);
}

#[test]
fn request_splits_configured_command_and_sets_padd_cwd() {
    let (dispatcher, _rx) = dispatcher_with(|_| {});
    let request = dispatcher
        .request(MaintenanceAction::UpdateSystem)
        .expect("request");
    assert_eq!(request.program, "sudo");
    assert_eq!(
        request.args,
        vec!["sh", "-c", "apt-get update && apt-get -y full-upgrade"]
    );
    assert!(request.cwd.is_none());

    let padd = dispatcher.request(MaintenanceAction::UpdatePadd).expect("padd");
    assert_eq!(padd.cwd.as_deref(), Some(Path::new("/tmp")));
}

#[test]
fn successful_command_streams_lines_then_completes() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_gravity = "sh -c 'echo one; echo two'".to_string();
    });
    dispatcher.run(MaintenanceAction::UpdateGravity);
    let (lines, outcome) = wait_for_outcome(&rx);
    dispatcher.join();
    assert_eq!(lines, vec!["one", "two"]);
    assert_eq!(outcome.action, MaintenanceAction::UpdateGravity);
    assert_eq!(
        outcome.status,
        ActionStatus::Success {
            message: "Gravity update completed successfully".to_string()
        }
    );
}

#[test]
fn non_zero_exit_reports_code_and_last_error_line() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_system = "sh -c 'echo first >&2; echo disk full >&2; exit 3'".to_string();
    });
    dispatcher.run(MaintenanceAction::UpdateSystem);
    let (_, outcome) = wait_for_outcome(&rx);
    assert_eq!(
        outcome.status,
        ActionStatus::Failure {
            exit_code: Some(3),
            last_error_line: Some("disk full".to_string()),
        }
    );
    assert_eq!(outcome.summary(), "Update System failed (exit code 3): disk full");
}

#[test]
fn missing_program_is_a_failure_without_exit_code() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.reboot = "/nonexistent/pihole-display-missing-binary".to_string();
    });
    dispatcher.run(MaintenanceAction::Reboot);
    let (_, outcome) = wait_for_outcome(&rx);
    match outcome.status {
        ActionStatus::Failure {
            exit_code: None,
            last_error_line: Some(line),
        } => assert!(line.contains("failed to start")),
        other => panic!("unexpected status {other:?}"),
    }
}

#[test]
fn padd_already_current_gets_a_dedicated_message() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_padd = "sh -c 'echo Already up to date.'".to_string();
    });
    dispatcher.run(MaintenanceAction::UpdatePadd);
    let (_, outcome) = wait_for_outcome(&rx);
    assert_eq!(outcome.summary(), "PADD is already up to date");
}

#[test]
fn pihole_update_waits_for_dns_then_succeeds() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_pihole = "true".to_string();
        c.dns_probe = "echo answered".to_string();
    });
    dispatcher.run(MaintenanceAction::UpdatePihole);
    let (lines, outcome) = wait_for_outcome(&rx);
    assert!(lines.iter().any(|line| line.contains("DNS service")));
    assert_eq!(outcome.summary(), "Pi-hole update completed successfully");
}

#[test]
fn dns_timeout_only_adds_a_warning() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_pihole = "true".to_string();
        c.dns_probe = "false".to_string();
    });
    dispatcher.run(MaintenanceAction::UpdatePihole);
    let (_, outcome) = wait_for_outcome(&rx);
    assert!(outcome.is_success());
    assert!(outcome.summary().contains("warning"));
}

#[test]
fn undecodable_output_does_not_cut_the_command_short() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_system = "sh -c \"printf 'caf\\351\\n'; printf 'bad\\351\\n' >&2; sleep 0.3; \
                           i=0; while [ $i -lt 20 ]; do echo line $i; i=$((i+1)); done; \
                           echo real error >&2\""
            .to_string();
    });
    dispatcher.run(MaintenanceAction::UpdateSystem);
    let (lines, outcome) = wait_for_outcome(&rx);
    dispatcher.join();
    assert_eq!(lines.first().map(String::as_str), Some("caf\u{FFFD}"));
    assert_eq!(lines.len(), 21);
    assert_eq!(lines.last().map(String::as_str), Some("line 19"));
    assert!(outcome.is_success(), "unexpected status {:?}", outcome.status);
}

#[test]
fn undecodable_stderr_keeps_the_last_error_line() {
    let (mut dispatcher, rx) = dispatcher_with(|c| {
        c.update_gravity =
            "sh -c \"printf 'bad\\351\\n' >&2; sleep 0.2; echo list locked >&2; exit 4\""
                .to_string();
    });
    dispatcher.run(MaintenanceAction::UpdateGravity);
    let (_, outcome) = wait_for_outcome(&rx);
    dispatcher.join();
    assert_eq!(
        outcome.status,
        ActionStatus::Failure {
            exit_code: Some(4),
            last_error_line: Some("list locked".to_string()),
        }
    );
}
