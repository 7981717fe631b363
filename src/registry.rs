//! Allowlist of runnable agents.
//!
//! The table is fixed when the registry is built and never changes. Lookups
//! check the allowlist first and then the filesystem, since the script
//! directory can drift independently of configuration.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ResolveError;

/// Agents known out of the box. Each maps to `<Name>.py` in the agents directory.
pub const BUILTIN_AGENTS: &[&str] = &[
    "Sun", "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune", "Pluto",
    "Luna", "Ceres", "Haumea", "Makemake", "Eris", "Io", "Europa", "Ganymede", "Callisto",
    "Titan", "Enceladus", "Triton", "Charon", "Phobos", "Deimos",
];

/// Default name -> script file table for [`BUILTIN_AGENTS`].
pub fn builtin_table() -> BTreeMap<String, String> {
    BUILTIN_AGENTS
        .iter()
        .map(|name| (name.to_string(), format!("{}.py", name)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentHealth {
    Healthy,
    Missing,
}

/// One row of the health report.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCheck {
    pub agent: String,
    pub path: PathBuf,
    pub status: AgentHealth,
}

impl AgentRegistry {
    /// Build from `(name, script)` pairs; relative scripts are joined onto `agents_dir`.
    pub fn new<I, N, S>(agents_dir: &Path, table: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<Path>,
    {
        let agents = table
            .into_iter()
            .map(|(name, script)| (name.into(), agents_dir.join(script)))
            .collect();
        Self { agents }
    }

    pub fn builtin(agents_dir: &Path) -> Self {
        Self::new(agents_dir, builtin_table())
    }

    /// Exact, case-sensitive lookup that also requires the script to exist right now.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ResolveError> {
        let path = self
            .agents
            .get(name)
            .ok_or_else(|| ResolveError::Unknown(name.to_string()))?;
        if !path.exists() {
            return Err(ResolveError::Missing {
                name: name.to_string(),
                path: path.clone(),
            });
        }
        Ok(path.clone())
    }

    /// Allowlisted names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn health(&self) -> Vec<AgentCheck> {
        self.agents
            .iter()
            .map(|(name, path)| AgentCheck {
                agent: name.clone(),
                path: path.clone(),
                status: if path.exists() {
                    AgentHealth::Healthy
                } else {
                    AgentHealth::Missing
                },
            })
            .collect()
    }
}
