use super::defaults::default_brightness_levels;
use super::validation::{load_settings, resolve_settings};
use super::{ControllerArgs, ControllerSettings, Settings, SupervisorArgs, DEFAULT_CONFIG_PATH};
use clap::Parser;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn unique_temp_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    env::temp_dir().join(format!("pihole_display_{label}_{}_{nanos}.yaml", std::process::id()))
}

#[test]
fn empty_document_resolves_to_defaults_without_warnings() {
    let loaded = resolve_settings("");
    assert_eq!(loaded.settings, Settings::default());
    assert!(loaded.warnings.is_empty());
}

#[test]
fn default_levels_step_evenly_from_full_to_off() {
    let levels = default_brightness_levels();
    assert_eq!(levels.len(), 8);
    assert_eq!(levels[0], 1.0);
    assert_eq!(levels[7], 0.0);
    assert!((levels[4] - 3.0 / 7.0).abs() < 1e-12);
}

#[test]
fn documented_defaults_match_the_published_contract() {
    let settings = Settings::default();
    assert_eq!(settings.session.name, "display");
    assert_eq!(settings.session.renderer_window, "padd");
    assert_eq!(settings.session.controller_window, "control");
    assert_eq!(settings.brightness.gamma, 1.8);
    assert_eq!(settings.timing.menu_timeout, Duration::from_secs(30));
    assert_eq!(settings.timing.feedback_delay, Duration::from_secs(3));
    assert_eq!(settings.buttons.hold, Duration::from_millis(2000));
    assert_eq!(settings.supervisor.probe_attempts, 10);
}

#[test]
fn valid_fields_override_defaults() {
    let yaml = r#"
session:
  name: kiosk
  renderer_window: stats
  controller_window: buttons
brightness:
  gamma: 2.2
  levels: [1.0, 0.5, 0.0]
timing:
  menu_timeout_secs: 45
  feedback_delay_secs: 0
buttons:
  pins: [5, 6, 13, 19]
  hold_ms: 1500
"#;
    let loaded = resolve_settings(yaml);
    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    let settings = loaded.settings;
    assert_eq!(settings.session.name, "kiosk");
    assert_eq!(settings.session.renderer_window, "stats");
    assert_eq!(settings.session.controller_window, "buttons");
    assert_eq!(settings.brightness.gamma, 2.2);
    assert_eq!(settings.brightness.levels, vec![1.0, 0.5, 0.0]);
    assert_eq!(settings.timing.menu_timeout, Duration::from_secs(45));
    assert_eq!(settings.timing.feedback_delay, Duration::ZERO);
    assert_eq!(settings.buttons.pins, [5, 6, 13, 19]);
    assert_eq!(settings.buttons.hold, Duration::from_millis(1500));
}

#[test]
fn unparseable_fields_fall_back_with_one_warning_each() {
    let yaml = r#"
brightness:
  gamma: bright
  levels: [1.0]
timing:
  menu_timeout_secs: -4
logging:
  level: chatty
"#;
    let loaded = resolve_settings(yaml);
    let defaults = Settings::default();
    assert_eq!(loaded.settings.brightness.gamma, defaults.brightness.gamma);
    assert_eq!(loaded.settings.brightness.levels, defaults.brightness.levels);
    assert_eq!(loaded.settings.timing.menu_timeout, defaults.timing.menu_timeout);
    assert_eq!(loaded.settings.logging.level, "info");
    let keys: Vec<&str> = loaded.warnings.iter().map(|w| w.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "brightness.gamma",
            "brightness.levels",
            "timing.menu_timeout_secs",
            "logging.level"
        ]
    );
}

#[test]
fn invalid_yaml_yields_defaults_and_a_warning() {
    let loaded = resolve_settings("session: [unterminated");
    assert_eq!(loaded.settings, Settings::default());
    assert_eq!(loaded.warnings.len(), 1);
    assert_eq!(loaded.warnings[0].key, "config");
}

#[test]
fn identical_window_names_are_rejected() {
    let loaded = resolve_settings("session:\n  renderer_window: same\n  controller_window: same\n");
    assert_eq!(loaded.settings.session.renderer_window, "padd");
    assert_eq!(loaded.settings.session.controller_window, "control");
    assert_eq!(loaded.warnings.len(), 1);
}

#[test]
fn duplicate_pins_are_rejected() {
    let loaded = resolve_settings("buttons:\n  pins: [5, 5, 6, 7]\n");
    assert_eq!(loaded.settings.buttons.pins, Settings::default().buttons.pins);
    assert_eq!(loaded.warnings[0].key, "buttons.pins");
}

#[test]
fn debounce_longer_than_hold_resets_both() {
    let loaded = resolve_settings("buttons:\n  debounce_ms: 400\n  hold_ms: 300\n");
    let defaults = Settings::default();
    assert_eq!(loaded.settings.buttons.debounce, defaults.buttons.debounce);
    assert_eq!(loaded.settings.buttons.hold, defaults.buttons.hold);
}

#[test]
fn unsplittable_action_command_keeps_default() {
    let loaded = resolve_settings("actions:\n  reboot: \"sudo 'reboot\"\n");
    assert_eq!(loaded.settings.actions.reboot, "sudo reboot");
    assert_eq!(loaded.warnings[0].key, "actions.reboot");
}

#[test]
fn controller_args_accept_string_or_list() {
    let loaded = resolve_settings("controller:\n  args: \"--config '/etc/my display.yaml'\"\n");
    assert_eq!(
        loaded.settings.controller.args,
        vec!["--config".to_string(), "/etc/my display.yaml".to_string()]
    );
    let loaded = resolve_settings("controller:\n  args: [--stderr-log]\n");
    assert_eq!(loaded.settings.controller.args, vec!["--stderr-log".to_string()]);
}

#[test]
fn launch_command_quotes_words_and_signature_is_script_path() {
    let controller = ControllerSettings {
        interpreter: Some("python3".to_string()),
        script: PathBuf::from("/opt/display/main.py"),
        args: vec!["--config".to_string(), "/etc/a b.yaml".to_string()],
    };
    assert_eq!(
        controller.launch_command(Path::new("/etc/ignored.yaml")),
        "python3 /opt/display/main.py --config '/etc/a b.yaml'"
    );
    assert_eq!(controller.launch_signature(), "/opt/display/main.py");
}

#[test]
fn launch_command_passes_the_resolved_settings_file() {
    let mut controller = Settings::default().controller;
    assert_eq!(
        controller.launch_command(Path::new("/srv/display test/config.yaml")),
        "/usr/local/bin/pihole-display --config '/srv/display test/config.yaml'"
    );

    controller.args = vec!["--stderr-log".to_string()];
    assert_eq!(
        controller.launch_command(Path::new("/x.yaml")),
        "/usr/local/bin/pihole-display --config /x.yaml --stderr-log"
    );

    controller.args = vec!["--config=/y.yaml".to_string()];
    assert_eq!(
        controller.launch_command(Path::new("/x.yaml")),
        "/usr/local/bin/pihole-display --config=/y.yaml"
    );
}

#[test]
fn missing_file_is_a_warning_not_an_error() {
    let path = unique_temp_path("missing");
    let loaded = load_settings(&path);
    assert_eq!(loaded.settings, Settings::default());
    assert!(loaded.source.is_none());
    assert_eq!(loaded.warnings.len(), 1);
}

#[test]
fn load_settings_reads_file_and_records_source() {
    let path = unique_temp_path("present");
    fs::write(&path, "timing:\n  feedback_delay_secs: 5\n").expect("write config");
    let loaded = load_settings(&path);
    let _ = fs::remove_file(&path);
    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    assert_eq!(loaded.settings.timing.feedback_delay, Duration::from_secs(5));
}

#[test]
fn cli_defaults_point_at_system_config() {
    let args = ControllerArgs::parse_from(["pihole-display"]);
    if env::var_os("PIHOLE_DISPLAY_CONFIG").is_none() {
        assert_eq!(args.common.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
    assert!(!args.common.stderr_log);

    let args = SupervisorArgs::parse_from(["pihole-session", "--attach", "--log-level", "debug"]);
    assert!(args.attach);
    assert_eq!(args.common.log_level.as_deref(), Some("debug"));
}
