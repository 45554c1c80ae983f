//! Parent process that keeps the main program alive.
//!
//! The supervisor forks the main program, watches it exit, and relaunches
//! it forever. Repeated failures in quick succession progressively strip
//! non-essential flags and shed daemons from the launch set, so a crash
//! caused by one daemon eventually leaves the rest of the host running.

use crate::mailer::Mailer;
use crate::tailbuf::TailBuffer;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, warn};

/// Shedding order. Daemons earlier in the list are presumed more likely to
/// destabilise the process (or matter less) and go first; the last daemon
/// of the user's chosen set is never shed.
pub const DAEMON_SHED_ORDER: &[&str] = &[
    "maintenance",
    "dnsd",
    "sockd",
    "smtpd",
    "httpd",
    "insecurehttpd",
    "plainsocket",
    "telegram",
];

/// Bytes of child stdout/stderr retained for failure notifications.
pub const TAIL_CAPACITY: usize = 4096;

/// Pause between a child's death and the next launch.
pub const RESTART_PAUSE: Duration = Duration::from_secs(10);

/// A child that survived this long resets the failure streak.
pub const FAILURE_STREAK_WINDOW: Duration = Duration::from_secs(20 * 60);

/// Flags whose value survives into degraded launch attempts.
const ESSENTIAL_FLAG: &str = "config";

fn flag_name(arg: &str) -> Option<&str> {
    let name = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))?;
    Some(name.split('=').next().unwrap_or(name))
}

/// Remove `--name value` and `--name=value` occurrences.
fn strip_flag_with_value(flags: &[String], name: &str) -> Vec<String> {
    let mut kept = Vec::with_capacity(flags.len());
    let mut skip_value = false;
    for arg in flags {
        if skip_value {
            skip_value = false;
            continue;
        }
        if flag_name(arg) == Some(name) {
            skip_value = !arg.contains('=');
            continue;
        }
        kept.push(arg.clone());
    }
    kept
}

/// Keep only `--name value` / `--name=value` occurrences.
fn keep_flag_with_value(flags: &[String], name: &str) -> Vec<String> {
    let mut kept = Vec::new();
    let mut take_value = false;
    for arg in flags {
        if take_value {
            kept.push(arg.clone());
            take_value = false;
            continue;
        }
        if flag_name(arg) == Some(name) {
            kept.push(arg.clone());
            take_value = !arg.contains('=');
        }
    }
    kept
}

pub struct Supervisor {
    /// Original command line flags, without the leading executable and
    /// without any pre-existing daemon selection.
    cli_flags: Vec<String>,
    daemon_names: Vec<String>,
    shed_sequence: Vec<Vec<String>>,
    notification_recipients: Vec<String>,
    mailer: Option<Arc<dyn Mailer>>,
    stdout_tail: Arc<TailBuffer>,
    stderr_tail: Arc<TailBuffer>,
}

impl Supervisor {
    pub fn new(
        cli_flags: Vec<String>,
        daemon_names: Vec<String>,
        notification_recipients: Vec<String>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let cli_flags = strip_flag_with_value(&cli_flags, "daemons");
        let shed_sequence = compute_shed_sequence(&daemon_names);
        Self {
            cli_flags,
            daemon_names,
            shed_sequence,
            notification_recipients,
            mailer,
            stdout_tail: Arc::new(TailBuffer::new(TAIL_CAPACITY)),
            stderr_tail: Arc::new(TailBuffer::new(TAIL_CAPACITY)),
        }
    }

    pub fn shed_sequence(&self) -> &[Vec<String>] {
        &self.shed_sequence
    }

    /// Flags for the Nth consecutive launch attempt. Attempt 0 keeps the
    /// original flags; attempt 1 strips everything but the configuration
    /// file; later attempts additionally shed daemons round by round; an
    /// attempt count beyond the daemon count starts over with the full
    /// original parameters.
    pub fn get_launch_parameters(&self, attempt: usize) -> Vec<String> {
        let mut params: Vec<String>;
        let daemons: &[String];
        if attempt == 0 || attempt > self.daemon_names.len() {
            params = self.cli_flags.clone();
            daemons = &self.daemon_names;
        } else {
            params = keep_flag_with_value(&self.cli_flags, ESSENTIAL_FLAG);
            daemons = if attempt == 1 || self.shed_sequence.is_empty() {
                &self.daemon_names
            } else {
                let round = (attempt - 2).min(self.shed_sequence.len() - 1);
                &self.shed_sequence[round]
            };
        }
        params.push("--supervisor".to_string());
        params.push("false".to_string());
        params.push("--daemons".to_string());
        params.push(daemons.join(","));
        params
    }

    /// Launch and relaunch the main program forever.
    pub async fn start(&self) {
        let mut attempt: usize = 0;
        let mut last_attempt_at = Instant::now();
        loop {
            let params = self.get_launch_parameters(attempt);
            info!(attempt, "supervisor launching main program: {}", params.join(" "));
            let failure = self.run_child_once(&params).await;
            warn!(attempt, "main program is gone: {failure}");
            self.notify_failure(attempt, &params, &failure).await;
            if last_attempt_at.elapsed() < FAILURE_STREAK_WINDOW {
                attempt += 1;
            } else {
                attempt = 0;
            }
            last_attempt_at = Instant::now();
            tokio::time::sleep(RESTART_PAUSE).await;
        }
    }

    /// Fork the main program and wait for it to die. Even a clean exit is
    /// a failure: the main program is not expected to exit at all.
    async fn run_child_once(&self, params: &[String]) -> String {
        let exe = match std::env::current_exe() {
            Ok(exe) => exe,
            Err(err) => return format!("cannot determine executable path: {err}"),
        };
        let mut child = match tokio::process::Command::new(&exe)
            .args(params)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => return format!("failed to launch main program: {err}"),
        };
        pump(child.stdout.take(), self.stdout_tail.clone());
        pump(child.stderr.take(), self.stderr_tail.clone());
        match child.wait().await {
            Ok(status) => format!("main program exited with {status}"),
            Err(err) => format!("failed to wait for main program: {err}"),
        }
    }

    async fn notify_failure(&self, attempt: usize, params: &[String], failure: &str) {
        let Some(mailer) = &self.mailer else {
            return;
        };
        if self.notification_recipients.is_empty() {
            return;
        }
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
        let subject = format!("outpost supervisor on {host}: main program failure");
        let body = format!(
            "{failure}\n\nattempt: {attempt}\nflags: {}\nclock: {} ({} local)\n\nstdout tail:\n{}\n\nstderr tail:\n{}\n",
            params.join(" "),
            chrono::Utc::now().to_rfc3339(),
            chrono::Local::now().to_rfc3339(),
            self.stdout_tail.retrieve(),
            self.stderr_tail.retrieve(),
        );
        if let Err(err) = mailer
            .send(&subject, &body, &self.notification_recipients)
            .await
        {
            warn!("failed to send supervisor notification: {err}");
        }
    }
}

fn pump(pipe: Option<impl AsyncRead + Unpin + Send + 'static>, tail: Arc<TailBuffer>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    tokio::spawn(async move {
        let mut chunk = [0u8; 1024];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => tail.write(&chunk[..n]),
            }
        }
    });
}

/// One round per sheddable daemon, each with exactly one daemon fewer than
/// the previous, walking [`DAEMON_SHED_ORDER`]. The final daemon of the
/// user's set survives every round.
fn compute_shed_sequence(daemon_names: &[String]) -> Vec<Vec<String>> {
    let mut remaining: Vec<String> = daemon_names.to_vec();
    let mut rounds = Vec::new();
    for shed in DAEMON_SHED_ORDER {
        if remaining.len() <= 1 {
            break;
        }
        if let Some(pos) = remaining.iter().position(|d| d == shed) {
            remaining.remove(pos);
            rounds.push(remaining.clone());
        }
    }
    rounds
}
