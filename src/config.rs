//! Gateway configuration, loaded from an optional TOML file.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [workers]
//! count = 2
//! timeout_secs = 60
//!
//! [agents]
//! dir = "backend/agents"
//! interpreter = "python3"
//!
//! [agents.allow]
//! Sun = "Sun.py"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::ExecutorSettings;
use crate::registry::{AgentRegistry, builtin_table};
use crate::worker::DEFAULT_POOL_SIZE;

/// Environment variable that overrides `server.port`.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads; raised to at least 2.
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Per-job wall-clock budget.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between SIGTERM and SIGKILL for a timed-out agent.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            timeout_secs: default_timeout_secs(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Directory holding the agent scripts.
    #[serde(default = "default_agents_dir")]
    pub dir: PathBuf,
    /// Program that runs each script. Empty means run the script directly.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Where per-job payload/output files go. Defaults to the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
    /// Agent name -> script file, relative to `dir`.
    #[serde(default = "builtin_table")]
    pub allow: BTreeMap<String, String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            dir: default_agents_dir(),
            interpreter: default_interpreter(),
            scratch_dir: None,
            allow: builtin_table(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_worker_count() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_kill_grace_ms() -> u64 {
    500
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("backend").join("agents")
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: GatewayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` if given, else defaults; then apply environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::var(PORT_ENV).ok().as_deref())?;
        Ok(config)
    }

    /// Apply the value of `PORT`, if set.
    pub fn apply_env(&mut self, port: Option<&str>) -> Result<()> {
        if let Some(raw) = port {
            self.server.port = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {:?}", PORT_ENV, raw))?;
        }
        Ok(())
    }

    /// Worker count with the pool minimum applied.
    pub fn worker_count(&self) -> usize {
        if self.workers.count < DEFAULT_POOL_SIZE {
            log::warn!(
                "workers.count = {} is below the minimum; using {}",
                self.workers.count,
                DEFAULT_POOL_SIZE
            );
        }
        self.workers.count.max(DEFAULT_POOL_SIZE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.workers.timeout_secs)
    }

    pub fn registry(&self) -> AgentRegistry {
        AgentRegistry::new(&self.agents.dir, self.agents.allow.clone())
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        let interpreter = self.agents.interpreter.trim();
        ExecutorSettings {
            interpreter: (!interpreter.is_empty()).then(|| interpreter.to_string()),
            scratch_dir: self
                .agents
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            kill_grace: Duration::from_millis(self.workers.kill_grace_ms),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
