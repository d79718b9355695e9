//! Process execution.
//!
//! [`Spawner`] launches supervised instances: it starts the shell, hands the
//! child's stdout and stderr to relay tasks, and parks the child in a watcher
//! task that reports the exit back to the event channel once the streams are
//! drained. [`run_once`] runs a single command in the foreground with
//! inherited standard I/O.

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::environment::EnvSnapshot;
use crate::events::Event;
use crate::exit::ExitOutcome;
use crate::output::{relay_stream, StreamKind};
use crate::process::{InstanceKey, ProcessSpec};
use crate::shell::Shell;

/// How long to wait for stream readers after the child has exited.
///
/// Grandchildren that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Creates supervised child processes.
#[derive(Debug, Clone)]
pub struct Spawner {
    shell: Shell,
    event_tx: mpsc::Sender<Event>,
}

impl Spawner {
    pub fn new(shell: Shell, event_tx: mpsc::Sender<Event>) -> Self {
        Self { shell, event_tx }
    }

    /// Starts `spec` as incarnation `incarnation` of `key` and returns its pid.
    ///
    /// The exit is reported later as [`Event::InstanceExited`].
    pub fn spawn(&self, key: &InstanceKey, incarnation: u64, spec: &ProcessSpec) -> Result<u32> {
        let mut command = self.shell.command(spec);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                let _ = libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", key))?;
        let pid = child
            .id()
            .with_context(|| format!("{} exited before its pid was read", key))?;
        debug!(%key, incarnation, pid, command = %spec.command, "spawned instance");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(relay_stream(
                key.clone(),
                incarnation,
                StreamKind::Stdout,
                stdout,
                self.event_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(relay_stream(
                key.clone(),
                incarnation,
                StreamKind::Stderr,
                stderr,
                self.event_tx.clone(),
            )));
        }

        tokio::spawn(watch_instance(
            key.clone(),
            incarnation,
            pid,
            child,
            readers,
            self.event_tx.clone(),
        ));
        Ok(pid)
    }
}

async fn watch_instance(
    key: InstanceKey,
    incarnation: u64,
    pid: u32,
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    tx: mpsc::Sender<Event>,
) {
    let status = child.wait().await;
    for reader in readers {
        let _ = tokio::time::timeout(OUTPUT_DRAIN, reader).await;
    }
    let event = match status {
        Ok(status) => Event::InstanceExited {
            key,
            incarnation,
            pid,
            outcome: ExitOutcome::from_status(status),
        },
        Err(err) => Event::InstanceLost {
            key,
            incarnation,
            error: err.to_string(),
        },
    };
    let _ = tx.send(event).await;
}

/// Runs `command` once with inherited standard I/O and returns its exit code.
///
/// The environment is the snapshot with `overrides` on top; no port or worker
/// name is injected. A signal-terminated child reports `128 + signo`.
pub async fn run_once(
    shell: &Shell,
    snapshot: &EnvSnapshot,
    command: &str,
    overrides: &HashMap<String, String>,
) -> Result<i32> {
    let spec = ProcessSpec {
        command: command.to_string(),
        env: snapshot.merged(overrides),
        color: None,
    };
    let mut child = shell
        .command(&spec)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to run {}", command))?;
    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to wait for {}", command))?;
    Ok(exit_code(status))
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
