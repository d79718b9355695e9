//! The shared console every instance writes through.
//!
//! [`Console`] is the seam between the supervisor and whatever renders fleet
//! output. [`TerminalConsole`] prints prefixed, optionally colored lines.

use std::io::Write;
use std::time::Instant;

use crate::allocator::Color;
use crate::output::sanitize_text;
use crate::process::{InstanceKey, ProcessSpec};

pub const SYSTEM_NAME: &str = "procfleet";

pub trait Console {
    /// Raw output chunk from an instance.
    fn log(&mut self, key: &InstanceKey, spec: &ProcessSpec, chunk: &str);
    /// Lifecycle message about an instance.
    fn info(&mut self, key: &InstanceKey, spec: &ProcessSpec, message: &str);
    /// Failure message about an instance.
    fn error(&mut self, key: &InstanceKey, spec: &ProcessSpec, message: &str);
    /// Fleet-level configuration warning.
    fn warn(&mut self, message: &str);
    /// Fleet-level configuration error.
    fn fatal(&mut self, message: &str);
}

/// Rendering options for [`TerminalConsole`].
#[derive(Debug, Clone, Default)]
pub struct ConsoleOptions {
    pub colors: bool,
    pub timestamp: bool,
    pub strip_ansi: bool,
    /// Minimum prefix width; keys are padded to it.
    pub prefix_length: Option<usize>,
}

/// Writes `[time] key | text` lines to a writer (stdout by default).
pub struct TerminalConsole<W: Write = std::io::Stdout> {
    out: W,
    options: ConsoleOptions,
    start: Instant,
}

impl TerminalConsole<std::io::Stdout> {
    pub fn stdout(options: ConsoleOptions) -> Self {
        Self::new(std::io::stdout(), options)
    }
}

impl<W: Write> TerminalConsole<W> {
    pub fn new(out: W, options: ConsoleOptions) -> Self {
        Self {
            out,
            options,
            start: Instant::now(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_lines(&mut self, name: &str, color: Option<Color>, text: &str) {
        let text = sanitize_text(text, self.options.strip_ansi);
        let prefix = self.format_prefix(name, color);
        for line in text.lines() {
            let _ = writeln!(self.out, "{}{}", prefix, line);
        }
        let _ = self.out.flush();
    }

    fn format_prefix(&self, name: &str, color: Option<Color>) -> String {
        let width = self.options.prefix_length.unwrap_or(0);
        let mut prefix = format!("{:<width$} | ", name, width = width);
        if self.options.timestamp {
            prefix = format!("{} {}", self.elapsed(), prefix);
        }
        if self.options.colors {
            prefix = apply_color(&prefix, color);
        }
        prefix
    }

    fn elapsed(&self) -> String {
        let secs = self.start.elapsed().as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

impl<W: Write> Console for TerminalConsole<W> {
    fn log(&mut self, key: &InstanceKey, spec: &ProcessSpec, chunk: &str) {
        self.write_lines(key.as_str(), spec.color, chunk);
    }

    fn info(&mut self, key: &InstanceKey, spec: &ProcessSpec, message: &str) {
        self.write_lines(key.as_str(), spec.color, message);
    }

    fn error(&mut self, key: &InstanceKey, spec: &ProcessSpec, message: &str) {
        let message = if self.options.colors {
            format!("\u{1b}[31m{}\u{1b}[0m", message)
        } else {
            message.to_string()
        };
        self.write_lines(key.as_str(), spec.color, &message);
    }

    fn warn(&mut self, message: &str) {
        self.write_lines(SYSTEM_NAME, Some(Color::Yellow), &format!("warning: {}", message));
    }

    fn fatal(&mut self, message: &str) {
        self.write_lines(SYSTEM_NAME, Some(Color::Red), &format!("error: {}", message));
    }
}

fn apply_color(prefix: &str, color: Option<Color>) -> String {
    match color {
        Some(color) => format!("\u{1b}[{}m{}\u{1b}[0m", color.ansi_code(), prefix),
        None => prefix.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Console;
    use crate::process::{InstanceKey, ProcessSpec};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Entry {
        Log { key: String, chunk: String },
        Info { key: String, message: String },
        Error { key: String, message: String },
        Warn(String),
        Fatal(String),
    }

    /// Keeps every console call for later assertions.
    #[derive(Debug, Default)]
    pub struct RecordingConsole {
        pub entries: Vec<Entry>,
    }

    impl RecordingConsole {
        pub fn infos_for(&self, key: &str) -> Vec<&str> {
            self.entries
                .iter()
                .filter_map(|entry| match entry {
                    Entry::Info { key: k, message } if k == key => Some(message.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn errors_for(&self, key: &str) -> Vec<&str> {
            self.entries
                .iter()
                .filter_map(|entry| match entry {
                    Entry::Error { key: k, message } if k == key => Some(message.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn output_for(&self, key: &str) -> String {
            self.entries
                .iter()
                .filter_map(|entry| match entry {
                    Entry::Log { key: k, chunk } if k == key => Some(chunk.as_str()),
                    _ => None,
                })
                .collect()
        }

        pub fn warnings(&self) -> usize {
            self.entries
                .iter()
                .filter(|entry| matches!(entry, Entry::Warn(_)))
                .count()
        }

        pub fn fatals(&self) -> usize {
            self.entries
                .iter()
                .filter(|entry| matches!(entry, Entry::Fatal(_)))
                .count()
        }
    }

    impl Console for RecordingConsole {
        fn log(&mut self, key: &InstanceKey, _spec: &ProcessSpec, chunk: &str) {
            self.entries.push(Entry::Log {
                key: key.to_string(),
                chunk: chunk.to_string(),
            });
        }

        fn info(&mut self, key: &InstanceKey, _spec: &ProcessSpec, message: &str) {
            self.entries.push(Entry::Info {
                key: key.to_string(),
                message: message.to_string(),
            });
        }

        fn error(&mut self, key: &InstanceKey, _spec: &ProcessSpec, message: &str) {
            self.entries.push(Entry::Error {
                key: key.to_string(),
                message: message.to_string(),
            });
        }

        fn warn(&mut self, message: &str) {
            self.entries.push(Entry::Warn(message.to_string()));
        }

        fn fatal(&mut self, message: &str) {
            self.entries.push(Entry::Fatal(message.to_string()));
        }
    }
}
