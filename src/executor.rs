//! Runs one agent script as an isolated child process.
//!
//! The payload is staged in a per-job temporary file that becomes the child's
//! stdin. Stdout and stderr share a second temporary file so the captured text
//! is one interleaved stream. Both files are removed when `execute` returns,
//! whichever way it returns.
//!
//! On Unix the child leads its own process group. When the time budget runs
//! out the whole group gets SIGTERM, then SIGKILL after a short grace period,
//! and a detached thread reaps the leader so the worker can move on.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::{Builder, NamedTempFile};

use crate::error::ExecError;
use crate::job::JobId;
#[cfg(not(unix))]
use crate::job::UNSET_EXIT_CODE;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How the executor launches scripts and where it stages files.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Program the script is handed to, e.g. `python3`. `None` runs the script itself.
    pub interpreter: Option<String>,
    /// Directory for per-job payload and output files.
    pub scratch_dir: PathBuf,
    /// Time between SIGTERM and SIGKILL on timeout.
    pub kill_grace: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            interpreter: Some("python3".to_string()),
            scratch_dir: std::env::temp_dir(),
            kill_grace: Duration::from_millis(500),
        }
    }
}

/// Outcome of a child that was launched successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// The child exited on its own within the time budget.
    Exited { output: String, exit_code: i32 },
    /// The time budget ran out; the child was signalled and abandoned.
    TimedOut,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    settings: ExecutorSettings,
}

impl ProcessExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run `script` with `payload` on stdin, waiting at most `timeout`.
    pub fn execute(
        &self,
        job: JobId,
        script: &Path,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Execution, ExecError> {
        let payload_file = self.stage_payload(job, payload)?;
        let mut output_file = self.scratch_file(job, "output").map_err(ExecError::Output)?;

        let mut cmd = self.command(script);
        cmd.stdin(Stdio::from(payload_file.reopen().map_err(ExecError::Payload)?));
        cmd.stdout(Stdio::from(output_file.as_file().try_clone().map_err(ExecError::Output)?));
        cmd.stderr(Stdio::from(output_file.as_file().try_clone().map_err(ExecError::Output)?));

        log::debug!("job {}: launching {:?}", job, cmd);
        let mut child = cmd.spawn().map_err(|source| ExecError::Launch {
            path: script.to_path_buf(),
            source,
        })?;

        // A budget too large to represent as an instant means no deadline.
        let deadline = Instant::now().checked_add(timeout);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let now = Instant::now();
                    let pause = match deadline {
                        Some(deadline) if now >= deadline => {
                            terminate(child, self.settings.kill_grace);
                            return Ok(Execution::TimedOut);
                        }
                        Some(deadline) => POLL_INTERVAL.min(deadline - now),
                        None => POLL_INTERVAL,
                    };
                    thread::sleep(pause);
                }
                Err(e) => {
                    terminate(child, self.settings.kill_grace);
                    return Err(ExecError::Wait(e));
                }
            }
        };

        let output = read_all(&mut output_file).map_err(ExecError::Output)?;
        Ok(Execution::Exited {
            output,
            exit_code: normalize_exit(status),
        })
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = match &self.settings.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(script);
                cmd
            }
            None => Command::new(script),
        };
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    fn stage_payload(&self, job: JobId, payload: &[u8]) -> Result<NamedTempFile, ExecError> {
        let mut file = self.scratch_file(job, "payload").map_err(ExecError::Payload)?;
        file.write_all(payload).map_err(ExecError::Payload)?;
        file.flush().map_err(ExecError::Payload)?;
        Ok(file)
    }

    fn scratch_file(&self, job: JobId, kind: &str) -> std::io::Result<NamedTempFile> {
        Builder::new()
            .prefix(&format!("job-{}-{}-", job, kind))
            .tempfile_in(&self.settings.scratch_dir)
    }
}

fn read_all(file: &mut NamedTempFile) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    file.as_file_mut().seek(SeekFrom::Start(0))?;
    file.as_file_mut().read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Numeric exit code for a normal exit, raw wait status otherwise.
pub fn normalize_exit(status: ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => raw_status(status),
    }
}

#[cfg(unix)]
fn raw_status(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.into_raw()
}

#[cfg(not(unix))]
fn raw_status(_status: ExitStatus) -> i32 {
    UNSET_EXIT_CODE
}

/// Stop a child that overran its budget without blocking the caller on it.
fn terminate(mut child: Child, grace: Duration) {
    let pid = child.id();
    signal_group(&mut child, Signal::Term);

    // An unrepresentable grace period escalates straight to SIGKILL.
    let deadline = Instant::now().checked_add(grace).unwrap_or_else(Instant::now);
    let mut reaped = false;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            reaped = true;
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    // Once the leader is reaped its pgid can be handed to an unrelated
    // process, so only sweep the group while the leader still holds it.
    // Group members that outlive a reaped leader are left alone.
    if reaped {
        return;
    }
    signal_group(&mut child, Signal::Kill);

    let reaper = thread::Builder::new()
        .name(format!("reap-{}", pid))
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(e) = reaper {
        log::warn!("could not spawn reaper for pid {}: {}", pid, e);
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Child, signal: Signal) {
    let signo = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let pgid = child.id() as libc::pid_t;
    // SAFETY: killpg only reads its integer arguments.
    let rc = unsafe { libc::killpg(pgid, signo) };
    if rc != 0 {
        log::debug!(
            "killpg({}, {:?}) failed: {}",
            pgid,
            signal,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _signal: Signal) {
    let _ = child.kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::process::ExitStatusExt;
    use tempfile::TempDir;

    fn sh_executor(scratch: &Path) -> ProcessExecutor {
        ProcessExecutor::new(ExecutorSettings {
            interpreter: Some("sh".to_string()),
            scratch_dir: scratch.to_path_buf(),
            kill_grace: Duration::from_millis(200),
        })
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn scratch_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_normalize_exit() {
        assert_eq!(normalize_exit(ExitStatus::from_raw(0)), 0);
        assert_eq!(normalize_exit(ExitStatus::from_raw(3 << 8)), 3);
        // Killed by SIGKILL: no exit code, raw status passes through.
        assert_eq!(normalize_exit(ExitStatus::from_raw(9)), 9);
    }

    #[test]
    fn test_payload_reaches_stdin_and_output_is_captured() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let script = write_script(agents.path(), "echo.sh", "cat\necho OK\n");

        let result = sh_executor(scratch.path())
            .execute(JobId::new(1), &script, b"{\"x\":1}\n", Duration::from_secs(10))
            .unwrap();

        assert_eq!(
            result,
            Execution::Exited {
                output: "{\"x\":1}\nOK\n".to_string(),
                exit_code: 0
            }
        );
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn test_stderr_is_merged() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let script = write_script(agents.path(), "mixed.sh", "echo out\necho err >&2\nexit 3\n");

        let result = sh_executor(scratch.path())
            .execute(JobId::new(2), &script, b"x", Duration::from_secs(10))
            .unwrap();

        match result {
            Execution::Exited { output, exit_code } => {
                assert_eq!(exit_code, 3);
                assert!(output.contains("out"));
                assert!(output.contains("err"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timeout_kills_process_group() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let marker = agents.path().join("survived");
        let script = write_script(
            agents.path(),
            "slow.sh",
            &format!("sleep 3\ntouch {}\n", marker.display()),
        );

        let started = Instant::now();
        let result = sh_executor(scratch.path())
            .execute(JobId::new(3), &script, b"x", Duration::from_millis(300))
            .unwrap();

        assert_eq!(result, Execution::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(scratch_entries(scratch.path()), 0);

        thread::sleep(Duration::from_secs(4));
        assert!(!marker.exists(), "timed-out agent kept running");
    }

    #[test]
    fn test_unrepresentable_timeout_means_no_deadline() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let script = write_script(agents.path(), "ok.sh", "echo OK\n");

        let result = sh_executor(scratch.path())
            .execute(JobId::new(5), &script, b"x", Duration::MAX)
            .unwrap();

        assert_eq!(
            result,
            Execution::Exited {
                output: "OK\n".to_string(),
                exit_code: 0
            }
        );
    }

    #[test]
    fn test_sigterm_ignored_escalates_to_sigkill() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let marker = agents.path().join("survived");
        let script = write_script(
            agents.path(),
            "stubborn.sh",
            &format!("trap '' TERM\nsleep 3\ntouch {}\n", marker.display()),
        );

        let started = Instant::now();
        let result = sh_executor(scratch.path())
            .execute(JobId::new(6), &script, b"x", Duration::from_millis(200))
            .unwrap();

        assert_eq!(result, Execution::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
        thread::sleep(Duration::from_secs(4));
        assert!(!marker.exists(), "agent ignoring SIGTERM kept running");
    }

    #[test]
    fn test_unrepresentable_grace_kills_immediately() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let script = write_script(agents.path(), "stubborn.sh", "trap '' TERM\nsleep 30\n");
        let executor = ProcessExecutor::new(ExecutorSettings {
            interpreter: Some("sh".to_string()),
            scratch_dir: scratch.path().to_path_buf(),
            kill_grace: Duration::MAX,
        });

        let started = Instant::now();
        let result = executor
            .execute(JobId::new(8), &script, b"x", Duration::from_millis(200))
            .unwrap();

        assert_eq!(result, Execution::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_launch_failure() {
        let scratch = TempDir::new().unwrap();
        let executor = ProcessExecutor::new(ExecutorSettings {
            interpreter: None,
            scratch_dir: scratch.path().to_path_buf(),
            kill_grace: Duration::from_millis(100),
        });

        let missing = scratch.path().join("no-such-agent");
        let err = executor
            .execute(JobId::new(4), &missing, b"x", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }));
        assert!(err.to_string().starts_with("failed to launch agent"));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn test_scratch_files_are_keyed_by_job() {
        let agents = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let listing = format!("ls {}\n", scratch.path().display());
        let script = write_script(agents.path(), "ls.sh", &listing);

        let result = sh_executor(scratch.path())
            .execute(JobId::new(77), &script, b"x", Duration::from_secs(10))
            .unwrap();

        let Execution::Exited { output, .. } = result else {
            panic!("expected exit");
        };
        assert!(output.contains("job-77-payload-"));
        assert!(output.contains("job-77-output-"));
    }
}
