//! Data structures describing a supervised instance.
//!
//! A `ProcessSpec` is what gets launched; an `InstanceKey` names the unit that
//! survives across respawns; a `LiveHandle` identifies one concrete incarnation.

use std::collections::HashMap;
use std::fmt;

use crate::allocator::Color;

/// Environment key carrying the instance's assigned port.
pub const PORT_VAR: &str = "PORT";
/// Environment key carrying the instance's `{type}.{n}` name.
pub const WORKER_NAME_VAR: &str = "PROCFLEET_WORKER_NAME";

/// `{process_type}.{instance}` with a 1-based instance number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey(String);

impl InstanceKey {
    pub fn new(process_type: &str, instance: usize) -> Self {
        Self(format!("{}.{}", process_type, instance))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Specification for a process to be run.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Command line handed to the shell as a single string.
    pub command: String,
    /// Complete environment of the child; replaces, never extends, the supervisor's.
    pub env: HashMap<String, String>,
    /// Prefix color; one-shot runs have none.
    pub color: Option<Color>,
}

impl ProcessSpec {
    pub fn port(&self) -> Option<&str> {
        self.env.get(PORT_VAR).map(String::as_str)
    }
}

/// The live process behind an instance key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveHandle {
    pub pid: u32,
    /// Increments on every spawn attempt of the same key.
    pub incarnation: u64,
}
