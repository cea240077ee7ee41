use super::defaults::{
    default_brightness_levels, DEFAULT_CONTROLLER_WINDOW, DEFAULT_RENDERER_WINDOW,
    KNOWN_LOG_LEVELS, MAX_GAMMA, MAX_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY,
};
use super::Settings;
use serde_yaml::Value;
use std::{
    fmt, fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    time::Duration,
};

/// A setting that was present but unusable and has been replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (using default)", self.key, self.message)
    }
}

/// Settings plus everything the caller should log about how they were resolved.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub source: Option<PathBuf>,
    pub warnings: Vec<ConfigWarning>,
}

/// Read and resolve the settings file. Never fails: an unreadable file yields defaults.
pub fn load_settings(path: &Path) -> LoadedSettings {
    match fs::read_to_string(path) {
        Ok(text) => {
            let mut loaded = resolve_settings(&text);
            loaded.source = Some(path.to_path_buf());
            loaded
        }
        Err(err) => LoadedSettings {
            settings: Settings::default(),
            source: None,
            warnings: vec![ConfigWarning::new(
                "config",
                format!("cannot read '{}': {err}", path.display()),
            )],
        },
    }
}

/// Resolve settings from YAML text, substituting defaults field by field.
pub fn resolve_settings(text: &str) -> LoadedSettings {
    let root = match serde_yaml::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => {
            return LoadedSettings {
                settings: Settings::default(),
                source: None,
                warnings: vec![ConfigWarning::new("config", format!("invalid YAML: {err}"))],
            }
        }
    };

    let mut resolver = Resolver::new(&root);
    if !matches!(root, Value::Mapping(_) | Value::Null) {
        resolver.warn("config", "top level must be a mapping");
    }
    let settings = resolver.resolve();
    LoadedSettings {
        settings,
        source: None,
        warnings: resolver.warnings,
    }
}

struct Resolver<'a> {
    root: &'a Value,
    warnings: Vec<ConfigWarning>,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            warnings: Vec::new(),
        }
    }

    fn resolve(&mut self) -> Settings {
        let defaults = Settings::default();
        let mut settings = defaults.clone();

        let session = &mut settings.session;
        session.name = self.string("session", "name", &defaults.session.name);
        session.renderer_window =
            self.string("session", "renderer_window", &defaults.session.renderer_window);
        session.controller_window = self.string(
            "session",
            "controller_window",
            &defaults.session.controller_window,
        );
        if session.renderer_window == session.controller_window {
            self.warn(
                "session.controller_window",
                "must differ from session.renderer_window",
            );
            session.renderer_window = DEFAULT_RENDERER_WINDOW.to_string();
            session.controller_window = DEFAULT_CONTROLLER_WINDOW.to_string();
        }

        settings.renderer.script = self.path("renderer", "script", &defaults.renderer.script);
        settings.renderer.banner = self.optional_string("renderer", "banner");

        settings.controller.interpreter = self.optional_string("controller", "interpreter");
        settings.controller.script =
            self.path("controller", "script", &defaults.controller.script);
        settings.controller.args = self.words("controller", "args");

        let brightness = &mut settings.brightness;
        brightness.gamma =
            self.f64_in("brightness", "gamma", defaults.brightness.gamma, 0.1..=MAX_GAMMA);
        brightness.levels = self.levels("brightness", "levels");
        brightness.pwm_chip = self.u64_in(
            "brightness",
            "pwm_chip",
            defaults.brightness.pwm_chip.into(),
            0..=63,
        ) as u32;
        brightness.pwm_channel = self.u64_in(
            "brightness",
            "pwm_channel",
            defaults.brightness.pwm_channel.into(),
            0..=63,
        ) as u32;
        brightness.period_ns = self.u64_in(
            "brightness",
            "period_ns",
            defaults.brightness.period_ns,
            10_000..=100_000_000,
        );
        brightness.retry_attempts = self.u64_in(
            "brightness",
            "retry_attempts",
            defaults.brightness.retry_attempts.into(),
            1..=10,
        ) as u32;

        let buttons = &mut settings.buttons;
        buttons.pins = self.pins("buttons", "pins", defaults.buttons.pins);
        buttons.active_low = self.boolean("buttons", "active_low", defaults.buttons.active_low);
        buttons.debounce =
            self.millis("buttons", "debounce_ms", defaults.buttons.debounce, 1..=500);
        buttons.hold = self.millis("buttons", "hold_ms", defaults.buttons.hold, 250..=10_000);
        if buttons.debounce >= buttons.hold {
            self.warn("buttons.debounce_ms", "must be shorter than buttons.hold_ms");
            buttons.debounce = defaults.buttons.debounce;
            buttons.hold = defaults.buttons.hold;
        }
        buttons.queue_capacity = self.u64_in(
            "buttons",
            "queue_capacity",
            defaults.buttons.queue_capacity as u64,
            MIN_QUEUE_CAPACITY as u64..=MAX_QUEUE_CAPACITY as u64,
        ) as usize;

        settings.timing.menu_timeout =
            self.secs("timing", "menu_timeout_secs", defaults.timing.menu_timeout, 5..=600);
        settings.timing.feedback_delay = self.secs(
            "timing",
            "feedback_delay_secs",
            defaults.timing.feedback_delay,
            0..=60,
        );

        let supervisor = &mut settings.supervisor;
        supervisor.probe_attempts = self.u64_in(
            "supervisor",
            "probe_attempts",
            defaults.supervisor.probe_attempts.into(),
            2..=120,
        ) as u32;
        supervisor.poll_interval = self.millis(
            "supervisor",
            "poll_interval_ms",
            defaults.supervisor.poll_interval,
            0..=10_000,
        );
        supervisor.confirm_delay = self.millis(
            "supervisor",
            "confirm_delay_ms",
            defaults.supervisor.confirm_delay,
            0..=10_000,
        );
        supervisor.restart_delay = self.millis(
            "supervisor",
            "restart_delay_ms",
            defaults.supervisor.restart_delay,
            0..=30_000,
        );

        let actions = &mut settings.actions;
        let fallback = &defaults.actions;
        actions.update_gravity =
            self.command("actions", "update_gravity", &fallback.update_gravity);
        actions.update_pihole = self.command("actions", "update_pihole", &fallback.update_pihole);
        actions.update_padd = self.command("actions", "update_padd", &fallback.update_padd);
        actions.update_system = self.command("actions", "update_system", &fallback.update_system);
        actions.reboot = self.command("actions", "reboot", &fallback.reboot);
        actions.shutdown = self.command("actions", "shutdown", &fallback.shutdown);
        actions.dns_probe = self.command("actions", "dns_probe", &fallback.dns_probe);

        let logging = &mut settings.logging;
        logging.level = self.log_level("logging", "level", &defaults.logging.level);
        logging.file = self.path("logging", "file", &defaults.logging.file);
        logging.startup_file =
            self.path("logging", "startup_file", &defaults.logging.startup_file);

        settings
    }

    fn warn(&mut self, key: &str, message: impl Into<String>) {
        self.warnings.push(ConfigWarning::new(key, message));
    }

    fn lookup(&self, section: &str, key: &str) -> Option<&'a Value> {
        match self.root.get(section)?.get(key)? {
            Value::Null => None,
            value => Some(value),
        }
    }

    fn string(&mut self, section: &str, key: &str, default: &str) -> String {
        match self.lookup(section, key) {
            None => default.to_string(),
            Some(Value::String(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Some(_) => {
                self.warn(&format!("{section}.{key}"), "expected a non-empty string");
                default.to_string()
            }
        }
    }

    fn optional_string(&mut self, section: &str, key: &str) -> Option<String> {
        match self.lookup(section, key) {
            None => None,
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Some(_) => {
                self.warn(&format!("{section}.{key}"), "expected a string");
                None
            }
        }
    }

    fn path(&mut self, section: &str, key: &str, default: &Path) -> PathBuf {
        let default_text = default.to_string_lossy();
        PathBuf::from(self.string(section, key, &default_text))
    }

    fn command(&mut self, section: &str, key: &str, default: &str) -> String {
        let raw = self.string(section, key, default);
        match shell_words::split(&raw) {
            Ok(words) if !words.is_empty() => raw,
            Ok(_) => default.to_string(),
            Err(err) => {
                self.warn(&format!("{section}.{key}"), format!("cannot split command: {err}"));
                default.to_string()
            }
        }
    }

    fn words(&mut self, section: &str, key: &str) -> Vec<String> {
        match self.lookup(section, key) {
            None => Vec::new(),
            Some(Value::String(text)) => match shell_words::split(text) {
                Ok(words) => words,
                Err(err) => {
                    self.warn(
                        &format!("{section}.{key}"),
                        format!("cannot split arguments: {err}"),
                    );
                    Vec::new()
                }
            },
            Some(Value::Sequence(items)) => {
                let words: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect();
                words.unwrap_or_else(|| {
                    self.warn(&format!("{section}.{key}"), "expected a list of strings");
                    Vec::new()
                })
            }
            Some(_) => {
                self.warn(&format!("{section}.{key}"), "expected a string or list of strings");
                Vec::new()
            }
        }
    }

    fn u64_in(
        &mut self,
        section: &str,
        key: &str,
        default: u64,
        range: RangeInclusive<u64>,
    ) -> u64 {
        match self.lookup(section, key) {
            None => default,
            Some(value) => match value.as_u64() {
                Some(number) if range.contains(&number) => number,
                Some(number) => {
                    self.warn(
                        &format!("{section}.{key}"),
                        format!(
                            "{number} is outside {}..={}",
                            range.start(),
                            range.end()
                        ),
                    );
                    default
                }
                None => {
                    self.warn(&format!("{section}.{key}"), "expected a non-negative integer");
                    default
                }
            },
        }
    }

    fn f64_in(
        &mut self,
        section: &str,
        key: &str,
        default: f64,
        range: RangeInclusive<f64>,
    ) -> f64 {
        match self.lookup(section, key) {
            None => default,
            Some(value) => match value.as_f64() {
                Some(number) if number.is_finite() && range.contains(&number) => number,
                Some(number) => {
                    self.warn(
                        &format!("{section}.{key}"),
                        format!("{number} is outside {}..={}", range.start(), range.end()),
                    );
                    default
                }
                None => {
                    self.warn(&format!("{section}.{key}"), "expected a number");
                    default
                }
            },
        }
    }

    fn millis(
        &mut self,
        section: &str,
        key: &str,
        default: Duration,
        range: RangeInclusive<u64>,
    ) -> Duration {
        let default_ms = default.as_millis() as u64;
        Duration::from_millis(self.u64_in(section, key, default_ms, range))
    }

    fn secs(
        &mut self,
        section: &str,
        key: &str,
        default: Duration,
        range: RangeInclusive<u64>,
    ) -> Duration {
        Duration::from_secs(self.u64_in(section, key, default.as_secs(), range))
    }

    fn boolean(&mut self, section: &str, key: &str, default: bool) -> bool {
        match self.lookup(section, key) {
            None => default,
            Some(Value::Bool(flag)) => *flag,
            Some(_) => {
                self.warn(&format!("{section}.{key}"), "expected true or false");
                default
            }
        }
    }

    fn levels(&mut self, section: &str, key: &str) -> Vec<f64> {
        let Some(value) = self.lookup(section, key) else {
            return default_brightness_levels();
        };
        let parsed: Option<Vec<f64>> = value
            .as_sequence()
            .and_then(|items| items.iter().map(Value::as_f64).collect());
        match parsed {
            Some(levels)
                if levels.len() >= 2
                    && levels
                        .iter()
                        .all(|level| level.is_finite() && (0.0..=1.0).contains(level)) =>
            {
                levels
            }
            _ => {
                self.warn(
                    &format!("{section}.{key}"),
                    "expected at least two fractions between 0.0 and 1.0",
                );
                default_brightness_levels()
            }
        }
    }

    fn pins(&mut self, section: &str, key: &str, default: [u64; 4]) -> [u64; 4] {
        let Some(value) = self.lookup(section, key) else {
            return default;
        };
        let parsed: Option<Vec<u64>> = value
            .as_sequence()
            .and_then(|items| items.iter().map(Value::as_u64).collect());
        match parsed.as_deref() {
            Some(&[a, b, c, d]) => {
                let pins = [a, b, c, d];
                let distinct = pins
                    .iter()
                    .enumerate()
                    .all(|(idx, pin)| !pins[idx + 1..].contains(pin));
                if distinct {
                    pins
                } else {
                    self.warn(&format!("{section}.{key}"), "pins must be distinct");
                    default
                }
            }
            _ => {
                self.warn(&format!("{section}.{key}"), "expected exactly four pin numbers");
                default
            }
        }
    }

    fn log_level(&mut self, section: &str, key: &str, default: &str) -> String {
        let level = self.string(section, key, default).to_ascii_lowercase();
        if KNOWN_LOG_LEVELS.contains(&level.as_str()) {
            level
        } else {
            self.warn(
                &format!("{section}.{key}"),
                format!("unknown level '{level}', expected one of {KNOWN_LOG_LEVELS:?}"),
            );
            default.to_string()
        }
    }
}
