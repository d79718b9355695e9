//! Procfile loading.
//!
//! A Procfile declares one process type per line as `name: command`. Blank
//! lines and `#` comments are skipped and declaration order is kept, since it
//! decides the default formation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::error::FleetError;

/// Declared process types, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Procfile {
    entries: Vec<(String, String)>,
}

impl Procfile {
    pub fn parse(raw: &str) -> Result<Self, FleetError> {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let malformed = || FleetError::MalformedProcfileLine {
                line: idx + 1,
                text: trimmed.to_string(),
            };
            let (name, command) = trimmed.split_once(':').ok_or_else(malformed)?;
            let name = name.trim();
            let command = command.trim();
            if name.is_empty() || command.is_empty() || name.contains(char::is_whitespace) {
                return Err(malformed());
            }
            if entries.iter().any(|(existing, _)| existing == name) {
                return Err(FleetError::DuplicateProcessType(name.to_string()));
            }
            entries.push((name.to_string(), command.to_string()));
        }
        Ok(Self { entries })
    }

    pub fn from_entries<I, N, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, command)| (name.into(), command.into()))
                .collect(),
        }
    }

    pub fn command(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, command)| command.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, command)| (name.as_str(), command.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads and parses a Procfile from disk.
pub fn load_procfile(path: &Path) -> Result<Procfile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read Procfile {}", path.display()))?;
    let procfile = Procfile::parse(&raw)
        .with_context(|| format!("failed to parse Procfile {}", path.display()))?;
    Ok(procfile)
}
