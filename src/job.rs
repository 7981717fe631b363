//! Job records and their lifecycle.
//!
//! A job moves `queued -> running -> {done | error | timeout}`. Every
//! transition builds a new [`JobRecord`] which the owning worker then writes
//! back to the store in one replace, so readers only ever see whole states.

use chrono::Utc;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::InvalidJobId;

/// Exit code reported on timeout, matching coreutils `timeout(1)`.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code held by a record until it reaches a terminal state.
pub const UNSET_EXIT_CODE: i32 = -1;

/// Process-unique job identifier. Rendered as a decimal string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = InvalidJobId;

    /// Only the exact form `Display` produces is accepted, so `01` or `+1`
    /// never alias an issued id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .ok()
            .filter(|n| n.to_string() == s)
            .map(JobId)
            .ok_or_else(|| InvalidJobId(s.to_string()))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Done,
    Error,
    Timeout,
}

impl JobStatus {
    /// Terminal states are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Timeout)
    }

    /// Position along the lifecycle; terminal states share the last rank.
    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Done | JobStatus::Error | JobStatus::Timeout => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// One submitted unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub agent: String,
    /// Raw request body, handed verbatim to the agent's stdin.
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub status: JobStatus,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl JobRecord {
    pub fn new(id: JobId, agent: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id,
            agent: agent.into(),
            payload,
            status: JobStatus::Queued,
            exit_code: UNSET_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            created_at: Utc::now().to_rfc3339(),
            started_at: None,
            finished_at: None,
        }
    }

    /// `queued -> running`
    pub fn started(&self) -> Self {
        Self {
            status: JobStatus::Running,
            started_at: Some(Utc::now().to_rfc3339()),
            ..self.clone()
        }
    }

    /// Terminal transition with the agent's captured output.
    pub fn finished(
        &self,
        status: JobStatus,
        exit_code: i32,
        stdout: String,
        stderr: String,
    ) -> Self {
        debug_assert!(status.is_terminal());
        Self {
            status,
            exit_code,
            stdout,
            stderr,
            finished_at: Some(Utc::now().to_rfc3339()),
            ..self.clone()
        }
    }

    /// Terminal `error` carrying only a diagnostic; exit code stays unset.
    pub fn failed(&self, diagnostic: impl Into<String>) -> Self {
        self.finished(JobStatus::Error, UNSET_EXIT_CODE, String::new(), diagnostic.into())
    }

    /// Terminal `timeout` with the sentinel exit code.
    pub fn timed_out(&self, timeout: Duration) -> Self {
        self.finished(
            JobStatus::Timeout,
            TIMEOUT_EXIT_CODE,
            String::new(),
            format!("agent execution timed out ({})", format_budget(timeout)),
        )
    }
}

fn format_budget(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
