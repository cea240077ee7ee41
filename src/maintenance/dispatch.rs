use super::{ActionOutcome, ActionStatus, MaintenanceAction};
use crate::config::ActionCommands;
use crate::events::{ControllerEvent, EventSender};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const DNS_RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);
const DNS_RECOVERY_INTERVAL: Duration = Duration::from_secs(2);

fn already_up_to_date() -> &'static Regex {
    static UP_TO_DATE_RE: OnceLock<Regex> = OnceLock::new();
    UP_TO_DATE_RE.get_or_init(|| {
        Regex::new(r"(?i)already up[- ]to[- ]date").expect("up-to-date regex should compile")
    })
}

/// A fully resolved command for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: MaintenanceAction,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ActionRequest {
    fn display_line(&self) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(self.args.iter().cloned());
        shell_words::join(words)
    }
}

/// How long to wait for DNS to answer again after a Pi-hole update.
#[derive(Debug, Clone)]
struct DnsRecovery {
    probe: Vec<String>,
    timeout: Duration,
    interval: Duration,
}

/// Starts maintenance commands on worker threads and reports back through
/// the controller's event queue.
pub struct MaintenanceDispatcher {
    commands: ActionCommands,
    renderer_dir: Option<PathBuf>,
    dns: DnsRecovery,
    events: EventSender,
    worker: Option<JoinHandle<()>>,
}

impl MaintenanceDispatcher {
    pub fn new(commands: ActionCommands, renderer_script: &Path, events: EventSender) -> Self {
        let probe = shell_words::split(&commands.dns_probe).unwrap_or_default();
        Self {
            renderer_dir: renderer_script.parent().map(Path::to_path_buf),
            dns: DnsRecovery {
                probe,
                timeout: DNS_RECOVERY_TIMEOUT,
                interval: DNS_RECOVERY_INTERVAL,
            },
            commands,
            events,
            worker: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_dns_recovery(mut self, timeout: Duration, interval: Duration) -> Self {
        self.dns.timeout = timeout;
        self.dns.interval = interval;
        self
    }

    /// Split the configured command line for `action`.
    pub fn request(&self, action: MaintenanceAction) -> Result<ActionRequest> {
        let line = action.command_line(&self.commands);
        let mut words = shell_words::split(line)
            .with_context(|| format!("invalid command line for {action}: {line}"))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| anyhow!("empty command line for {action}"))?;
        let cwd = if action.runs_in_renderer_dir() {
            self.renderer_dir.clone()
        } else {
            None
        };
        Ok(ActionRequest {
            action,
            program,
            args: words.collect(),
            cwd,
        })
    }

    /// Start `action` in the background. Exactly one `ActionCompleted` is
    /// posted for it, even when the command cannot be resolved.
    pub fn run(&mut self, action: MaintenanceAction) {
        self.reap();
        let events = self.events.clone();
        let dns = self.dns.clone();
        let request = self.request(action);
        let spawned = thread::Builder::new()
            .name("maintenance".to_string())
            .spawn(move || {
                let started = Instant::now();
                let status = match request {
                    Ok(request) => execute(&request, &dns, &events),
                    Err(err) => ActionStatus::Failure {
                        exit_code: None,
                        last_error_line: Some(format!("{err:#}")),
                    },
                };
                let outcome = ActionOutcome {
                    action,
                    status,
                    elapsed: started.elapsed(),
                };
                log_outcome(&outcome);
                events.post(ControllerEvent::ActionCompleted(outcome));
            });
        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(err) => {
                error!("failed to start worker for {action}: {err}");
                self.events.post(ControllerEvent::ActionCompleted(ActionOutcome {
                    action,
                    status: ActionStatus::Failure {
                        exit_code: None,
                        last_error_line: Some(err.to_string()),
                    },
                    elapsed: Duration::ZERO,
                }));
            }
        }
    }

    /// Wait for the running worker, if any.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    fn reap(&mut self) {
        if self.worker.as_ref().is_some_and(|handle| handle.is_finished()) {
            self.join();
        }
    }
}

fn log_outcome(outcome: &ActionOutcome) {
    let secs = outcome.elapsed.as_secs_f32();
    if outcome.is_success() {
        info!("{} finished in {secs:.1}s: {}", outcome.action, outcome.summary());
    } else {
        error!("{} finished in {secs:.1}s: {}", outcome.action, outcome.summary());
    }
}

fn execute(request: &ActionRequest, dns: &DnsRecovery, events: &EventSender) -> ActionStatus {
    let action = request.action;
    info!(cwd = ?request.cwd, "starting {action}: {}", request.display_line());

    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &request.cwd {
        cmd.current_dir(dir);
    }
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return ActionStatus::Failure {
                exit_code: None,
                last_error_line: Some(format!("failed to start {}: {err}", request.program)),
            }
        }
    };

    let stderr_reader = child.stderr.take().map(|stderr| {
        thread::spawn(move || last_nonempty_line(stderr, action))
    });

    let mut up_to_date = false;
    if let Some(stdout) = child.stdout.take() {
        for_each_line(stdout, |line| {
            let line = line.trim_end().to_string();
            if already_up_to_date().is_match(&line) {
                up_to_date = true;
            }
            events.post(ControllerEvent::ActionProgress { action, line });
        });
    }
    let last_error_line = stderr_reader.and_then(|reader| reader.join().unwrap_or(None));

    let status = match child.wait() {
        Ok(status) => status,
        Err(err) => {
            return ActionStatus::Failure {
                exit_code: None,
                last_error_line: Some(format!("failed to wait for {}: {err}", request.program)),
            }
        }
    };
    if !status.success() {
        return ActionStatus::Failure {
            exit_code: status.code(),
            last_error_line,
        };
    }

    let message = match action {
        MaintenanceAction::UpdateGravity => "Gravity update completed successfully".to_string(),
        MaintenanceAction::UpdatePihole => {
            events.post(ControllerEvent::ActionProgress {
                action,
                line: "Waiting for the DNS service to restart...".to_string(),
            });
            if wait_for_dns(dns) {
                "Pi-hole update completed successfully".to_string()
            } else {
                format!(
                    "Pi-hole update completed successfully \
                     (warning: DNS did not answer within {}s)",
                    dns.timeout.as_secs()
                )
            }
        }
        MaintenanceAction::UpdatePadd if up_to_date => "PADD is already up to date".to_string(),
        MaintenanceAction::UpdatePadd => "PADD updated successfully".to_string(),
        MaintenanceAction::UpdateSystem => {
            "System update completed successfully; a reboot may be required".to_string()
        }
        MaintenanceAction::Reboot => "Rebooting...".to_string(),
        MaintenanceAction::Shutdown => "Shutting down...".to_string(),
    };
    ActionStatus::Success { message }
}

fn last_nonempty_line<R: Read>(stream: R, action: MaintenanceAction) -> Option<String> {
    let mut last = None;
    for_each_line(stream, |line| {
        let line = line.trim();
        if !line.is_empty() {
            warn!("{action} stderr: {line}");
            last = Some(line.to_string());
        }
    });
    last
}

/// Read `stream` to EOF, one line at a time. Undecodable bytes are replaced
/// rather than ending the read, so the child never writes into a closed pipe.
fn for_each_line<R: Read>(stream: R, mut each: impl FnMut(&str)) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => each(String::from_utf8_lossy(&buf).as_ref()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("stopped reading command output: {err}");
                break;
            }
        }
    }
}

/// Poll the DNS probe until it answers or the timeout passes.
fn wait_for_dns(dns: &DnsRecovery) -> bool {
    let Some((program, args)) = dns.probe.split_first() else {
        return true;
    };
    let deadline = Instant::now() + dns.timeout;
    loop {
        let answered = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map(|out| {
                out.status.success() && !String::from_utf8_lossy(&out.stdout).trim().is_empty()
            })
            .unwrap_or(false);
        if answered {
            info!("DNS service answering again");
            return true;
        }
        if Instant::now() + dns.interval > deadline {
            warn!(
                "DNS service did not recover within {}s",
                dns.timeout.as_secs()
            );
            return false;
        }
        thread::sleep(dns.interval);
    }
}
