//! Formation: how many instances of each process type to run.
//!
//! Written as `web=2,api=1` (commas or whitespace between entries); a bare
//! name means one instance. Entry order is significant because it decides
//! each type's port block and color offset.

use crate::error::FleetError;
use crate::procfile::Procfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formation {
    requirements: Vec<Requirement>,
}

impl Formation {
    /// Parses one or more formation arguments. A repeated name keeps its first
    /// position and takes the last count.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, FleetError> {
        let mut formation = Formation::default();
        let entries = args
            .iter()
            .flat_map(|arg| {
                arg.as_ref()
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        for entry in entries {
            let (name, count) = match entry.split_once('=') {
                Some((name, value)) => {
                    let count = value.trim().parse::<usize>().map_err(|_| {
                        FleetError::InvalidInstanceCount {
                            name: name.trim().to_string(),
                            value: value.trim().to_string(),
                        }
                    })?;
                    (name.trim().to_string(), count)
                }
                None => (entry.clone(), 1),
            };
            formation.set(name, count);
        }
        Ok(formation)
    }

    /// One instance of every declared type, in Procfile order.
    pub fn one_each(procfile: &Procfile) -> Self {
        let mut formation = Formation::default();
        for name in procfile.names() {
            formation.set(name.to_string(), 1);
        }
        formation
    }

    pub fn set(&mut self, name: String, count: usize) {
        match self.requirements.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.count = count,
            None => self.requirements.push(Requirement { name, count }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}
