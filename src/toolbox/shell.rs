//! Shell command execution with a hard timeout.

use super::{Command, CmdError, Feature, FeatureResult, TRIGGER_SHELL};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

pub const DEFAULT_INTERPRETER: &str = "/bin/sh";

/// Runs the command content through the system shell. Stdout and stderr are
/// captured as they arrive, so a timed-out command still yields the output
/// it managed to produce before being killed.
pub struct RunShell {
    pub interpreter: String,
}

impl Default for RunShell {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }
}

fn drain(
    pipe: Option<impl AsyncRead + Unpin + Send + 'static>,
    sink: Arc<Mutex<Vec<u8>>>,
) -> Option<JoinHandle<()>> {
    let mut pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.lock().unwrap().extend_from_slice(&chunk[..n]),
            }
        }
    }))
}

#[async_trait::async_trait]
impl Feature for RunShell {
    fn trigger(&self) -> &'static str {
        TRIGGER_SHELL
    }

    fn self_test(&self) -> Result<(), CmdError> {
        if Path::new(&self.interpreter).exists() {
            Ok(())
        } else {
            Err(CmdError::FeatureFailure(format!(
                "shell interpreter {} does not exist",
                self.interpreter
            )))
        }
    }

    async fn execute(&self, cmd: &Command) -> FeatureResult {
        let script = cmd.trimmed();
        if script.is_empty() {
            return FeatureResult::err(CmdError::EmptyCommand);
        }
        let mut child = match tokio::process::Command::new(&self.interpreter)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return FeatureResult::err(CmdError::FeatureFailure(format!(
                    "failed to launch shell: {err}"
                )));
            }
        };
        let captured = Arc::new(Mutex::new(Vec::new()));
        let readers: Vec<_> = [
            drain(child.stdout.take(), captured.clone()),
            drain(child.stderr.take(), captured.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let timeout = std::time::Duration::from_secs(cmd.timeout_sec.max(1));
        let mut timed_out = false;
        let error = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => None,
            Ok(Ok(status)) => Some(CmdError::FeatureFailure(format!("{status}"))),
            Ok(Err(err)) => Some(CmdError::FeatureFailure(format!(
                "failed to await shell: {err}"
            ))),
            Err(_) => {
                timed_out = true;
                child.kill().await.ok();
                Some(CmdError::FeatureFailure(format!(
                    "exceeded timeout of {} seconds",
                    cmd.timeout_sec
                )))
            }
        };
        for reader in readers {
            if timed_out {
                // Grandchildren may keep the pipes open indefinitely.
                reader.abort();
            } else {
                reader.await.ok();
            }
        }
        let output = String::from_utf8_lossy(&captured.lock().unwrap()).into_owned();
        FeatureResult { output, error }
    }
}
