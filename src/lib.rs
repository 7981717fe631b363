pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod job;
pub mod queue;
pub mod registry;
pub mod store;
pub mod worker;

pub use config::GatewayConfig;
pub use dispatch::{DEFAULT_TIMEOUT, Dispatcher};
pub use error::{ExecError, InvalidJobId, ResolveError, SubmitError};
pub use executor::{Execution, ExecutorSettings, ProcessExecutor};
pub use job::{JobId, JobRecord, JobStatus, TIMEOUT_EXIT_CODE, UNSET_EXIT_CODE};
pub use queue::WorkQueue;
pub use registry::{AgentCheck, AgentHealth, AgentRegistry, BUILTIN_AGENTS};
pub use store::JobStore;
pub use worker::{WorkerPool, process_job};
