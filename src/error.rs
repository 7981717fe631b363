use std::path::PathBuf;

use thiserror::Error;

/// Why an agent name could not be turned into a runnable script.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The name is not on the allowlist.
    #[error("unknown agent: {0}")]
    Unknown(String),
    /// The name is allowlisted but its script is not on disk.
    #[error("agent not found: {name} ({})", .path.display())]
    Missing { name: String, path: PathBuf },
}

/// Failures of the process executor that happen before an exit status exists.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to stage payload: {0}")]
    Payload(#[source] std::io::Error),
    #[error("failed to launch agent {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for agent: {0}")]
    Wait(#[source] std::io::Error),
    #[error("failed to read agent output: {0}")]
    Output(#[source] std::io::Error),
}

/// A job id that is not the canonical decimal form of an issued id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job id: {0:?}")]
pub struct InvalidJobId(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("empty body")]
    EmptyPayload,
}
