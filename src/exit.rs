//! Classification of instance terminations.

use std::process::ExitStatus;

use crate::signal::Signal;

/// How an incarnation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exit code 0.
    Success,
    /// Nonzero exit code, no signal.
    Failure { code: i32 },
    /// Terminated by SIGKILL, SIGTERM or SIGINT.
    FatalSignal { signal: Signal },
    /// Terminated by any other signal.
    BenignSignal { signal: Signal },
    /// The OS refused to create the process.
    SpawnFailed { error: String },
}

/// Log level the console should use for an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::from_code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(raw) = status.signal() {
                return Self::from_signal(Signal::from_raw(raw));
            }
        }
        ExitOutcome::Failure { code: -1 }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            ExitOutcome::Success
        } else {
            ExitOutcome::Failure { code }
        }
    }

    pub fn from_signal(signal: Signal) -> Self {
        if signal.is_fatal() {
            ExitOutcome::FatalSignal { signal }
        } else {
            ExitOutcome::BenignSignal { signal }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExitOutcome::Success | ExitOutcome::BenignSignal { .. } => Severity::Info,
            _ => Severity::Error,
        }
    }

    /// Whether the consecutive-failure counter should restart from zero.
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitOutcome::Success)
    }

    /// Console message for the outcome, naming the pid when there was one.
    pub fn describe(&self, pid: Option<u32>) -> String {
        let who = match pid {
            Some(pid) => format!("process {}", pid),
            None => "process".to_string(),
        };
        match self {
            ExitOutcome::Success => format!("{} exited successfully", who),
            ExitOutcome::Failure { code } => format!("{} exited with code {}", who, code),
            ExitOutcome::FatalSignal { signal } | ExitOutcome::BenignSignal { signal } => {
                format!("{} terminated by {}", who, signal)
            }
            ExitOutcome::SpawnFailed { error } => format!("failed to start: {}", error),
        }
    }
}
