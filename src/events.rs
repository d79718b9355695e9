//! Event definitions for the supervisor's event loop.
//!
//! Watcher and reader tasks never touch supervisor state; they report what
//! happened through these events and the loop applies them in order.

use crate::exit::ExitOutcome;
use crate::output::StreamKind;
use crate::process::InstanceKey;
use crate::signal::Signal;

#[derive(Debug, Clone)]
pub enum Event {
    /// A chunk of output (stdout or stderr) was read from an instance.
    InstanceOutput {
        key: InstanceKey,
        incarnation: u64,
        stream: StreamKind,
        chunk: String,
    },
    /// An incarnation terminated and its streams were drained.
    InstanceExited {
        key: InstanceKey,
        incarnation: u64,
        pid: u32,
        outcome: ExitOutcome,
    },
    /// Waiting on the child failed; the process state is unknown.
    InstanceLost {
        key: InstanceKey,
        incarnation: u64,
        error: String,
    },
    /// A respawn delay elapsed for `key`.
    Respawn { key: InstanceKey },
    /// The supervisor itself was asked to stop.
    Shutdown { signal: Signal },
}
