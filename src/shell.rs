//! Shell selection for running command strings.
//!
//! Chosen once per supervisor: Windows commands go through the command
//! interpreter (`COMSPEC`, falling back to `cmd.exe`) as `/s /c <command>`,
//! everything else through `/bin/sh -c <command>`.

use std::process::Stdio;

use tokio::process::Command;

use crate::environment::EnvSnapshot;
use crate::process::ProcessSpec;

const DEFAULT_INTERPRETER: &str = "cmd.exe";
const POSIX_SHELL: &str = "/bin/sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shell {
    /// Windows command interpreter.
    Interpreter { program: String },
    /// POSIX `sh -c`.
    Posix { program: String },
}

impl Shell {
    /// Picks the strategy for the host platform.
    pub fn detect(snapshot: &EnvSnapshot) -> Self {
        if cfg!(windows) {
            Self::interpreter(snapshot)
        } else {
            Self::posix()
        }
    }

    pub fn interpreter(snapshot: &EnvSnapshot) -> Self {
        let program = snapshot
            .get("COMSPEC")
            .or_else(|| snapshot.get("ComSpec"))
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_INTERPRETER)
            .to_string();
        Shell::Interpreter { program }
    }

    pub fn posix() -> Self {
        Shell::Posix {
            program: POSIX_SHELL.to_string(),
        }
    }

    pub fn program(&self) -> &str {
        match self {
            Shell::Interpreter { program } | Shell::Posix { program } => program,
        }
    }

    /// Argument vector passed to [`Shell::program`].
    pub fn args(&self, command: &str) -> Vec<String> {
        match self {
            Shell::Interpreter { .. } => vec!["/s".into(), "/c".into(), command.into()],
            Shell::Posix { .. } => vec!["-c".into(), command.into()],
        }
    }

    /// Builds a command for `spec` with its environment as the child's entire environment.
    ///
    /// Standard streams are left to the caller.
    pub fn command(&self, spec: &ProcessSpec) -> Command {
        let mut command = Command::new(self.program());
        command.args(self.args(&spec.command));
        command.env_clear();
        command.envs(&spec.env);
        command.stdin(Stdio::null());
        command
    }
}
