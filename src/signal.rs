//! Signal names, classification and delivery to child processes.

use std::fmt;
use std::io;

use crate::error::FleetError;

/// A POSIX signal, named the way operators type it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    Hup,
    Int,
    Quit,
    Abrt,
    Kill,
    Usr1,
    Segv,
    Usr2,
    Pipe,
    Alrm,
    Term,
    /// Any signal without a dedicated variant, by number.
    Other(i32),
}

const NAMED: [(Signal, &str); 11] = [
    (Signal::Hup, "SIGHUP"),
    (Signal::Int, "SIGINT"),
    (Signal::Quit, "SIGQUIT"),
    (Signal::Abrt, "SIGABRT"),
    (Signal::Kill, "SIGKILL"),
    (Signal::Usr1, "SIGUSR1"),
    (Signal::Segv, "SIGSEGV"),
    (Signal::Usr2, "SIGUSR2"),
    (Signal::Pipe, "SIGPIPE"),
    (Signal::Alrm, "SIGALRM"),
    (Signal::Term, "SIGTERM"),
];

impl Signal {
    /// Parses `SIGTERM`, `TERM` or `term`.
    pub fn parse(name: &str) -> Result<Self, FleetError> {
        let upper = name.trim().to_ascii_uppercase();
        let full = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{}", upper)
        };
        NAMED
            .iter()
            .find(|(_, candidate)| *candidate == full)
            .map(|(signal, _)| *signal)
            .ok_or_else(|| FleetError::UnknownSignal(name.to_string()))
    }

    /// Termination by these is treated as a failure; anything else is informational.
    pub fn is_fatal(self) -> bool {
        matches!(self, Signal::Kill | Signal::Term | Signal::Int)
    }

    #[cfg(unix)]
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            libc::SIGHUP => Signal::Hup,
            libc::SIGINT => Signal::Int,
            libc::SIGQUIT => Signal::Quit,
            libc::SIGABRT => Signal::Abrt,
            libc::SIGKILL => Signal::Kill,
            libc::SIGUSR1 => Signal::Usr1,
            libc::SIGSEGV => Signal::Segv,
            libc::SIGUSR2 => Signal::Usr2,
            libc::SIGPIPE => Signal::Pipe,
            libc::SIGALRM => Signal::Alrm,
            libc::SIGTERM => Signal::Term,
            other => Signal::Other(other),
        }
    }

    #[cfg(unix)]
    pub fn as_raw(self) -> i32 {
        match self {
            Signal::Hup => libc::SIGHUP,
            Signal::Int => libc::SIGINT,
            Signal::Quit => libc::SIGQUIT,
            Signal::Abrt => libc::SIGABRT,
            Signal::Kill => libc::SIGKILL,
            Signal::Usr1 => libc::SIGUSR1,
            Signal::Segv => libc::SIGSEGV,
            Signal::Usr2 => libc::SIGUSR2,
            Signal::Pipe => libc::SIGPIPE,
            Signal::Alrm => libc::SIGALRM,
            Signal::Term => libc::SIGTERM,
            Signal::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Signal::Other(raw) = self {
            return write!(f, "signal {}", raw);
        }
        let name = NAMED
            .iter()
            .find(|(signal, _)| signal == self)
            .map(|(_, name)| *name)
            .unwrap_or("SIG?");
        f.write_str(name)
    }
}

/// Delivers a signal to a live child.
pub trait SignalSink {
    fn deliver(&self, pid: u32, signal: Signal) -> io::Result<()>;
}

/// Sends real OS signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

impl SignalSink for OsSignals {
    fn deliver(&self, pid: u32, signal: Signal) -> io::Result<()> {
        send_os_signal(pid, signal)
    }
}

// Children lead their own process group. The group signal already reaches the
// leader, so the pid is signalled directly only when there is no such group.
#[cfg(unix)]
fn send_os_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let pid = pid as libc::pid_t;
    let sig = signal.as_raw();
    unsafe {
        if libc::kill(-pid, sig) == 0 {
            return Ok(());
        }
        if libc::kill(pid, sig) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(windows)]
fn send_os_signal(pid: u32, _signal: Signal) -> io::Result<()> {
    use windows_sys::Win32::System::Console::GenerateConsoleCtrlEvent;
    use windows_sys::Win32::System::Console::CTRL_BREAK_EVENT;
    // Windows has no POSIX signals; CTRL_BREAK is the closest console event.
    let ok = unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(not(unix), not(windows)))]
fn send_os_signal(_pid: u32, _signal: Signal) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not supported on this platform",
    ))
}
