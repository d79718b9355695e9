//! `.env` file loading for caller-supplied environment overrides.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::FleetError;

/// Parses dotenv syntax: `KEY=VALUE` lines with an optional `export ` prefix,
/// single or double quotes, escapes inside double quotes and `#` comments.
pub fn parse_env(raw: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    for item in dotenvy::from_read_iter(raw.as_bytes()) {
        let (key, value) = item.map_err(|err| match err {
            dotenvy::Error::LineParse(text, _) => anyhow::Error::new(FleetError::MalformedEnvLine {
                line: line_number(raw, &text),
                text: text.trim().to_string(),
            }),
            other => anyhow::Error::new(other),
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// 1-based line of `text` within `raw`, or 0 when it cannot be located.
fn line_number(raw: &str, text: &str) -> usize {
    let first = text.lines().next().unwrap_or_default().trim();
    raw.lines()
        .position(|line| line.trim() == first)
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

/// Loads an env file. A missing file is only an error when `required`.
pub fn load_env_file(path: &Path, required: bool) -> Result<HashMap<String, String>> {
    if !required && !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read env file {}", path.display()))?;
    let vars = parse_env(&raw)
        .with_context(|| format!("failed to parse env file {}", path.display()))?;
    Ok(vars)
}
