//! Configuration errors surfaced before or while launching a fleet.
//!
//! Per-instance failures (spawn refusals, crashes, signals) are not errors in
//! this sense: they are reported through the console and fed to the respawn
//! policy. Only the variants below ever reach a caller.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FleetError {
    /// Workers may not bind below 1024; only a front-end proxy may.
    #[error("only proxies can bind to privileged ports (got {port}, need >= 1024)")]
    PrivilegedPort { port: u16 },

    #[error("required process type '{name}' does not exist in the Procfile")]
    UnknownProcessType { name: String },

    #[error("instance count for '{name}' must be a non-negative integer (got '{value}')")]
    InvalidInstanceCount { name: String, value: String },

    #[error("port {port} for {key} is above 65535")]
    PortOutOfRange { key: String, port: u32 },

    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    #[error("process type '{0}' is declared more than once")]
    DuplicateProcessType(String),

    #[error("line {line}: expected 'name: command', got '{text}'")]
    MalformedProcfileLine { line: usize, text: String },

    #[error("line {line}: expected 'KEY=VALUE', got '{text}'")]
    MalformedEnvLine { line: usize, text: String },
}
