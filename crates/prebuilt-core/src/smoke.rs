//! Post-install smoke test.
//!
//! Runs the installed executable with its version-query arguments and
//! checks the exit status. A failure here never undoes the install.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// Default bound on how long the executable may run.
pub const DEFAULT_SMOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to keep reading output once the child has been killed.
const PIPE_GRACE: Duration = Duration::from_millis(100);

/// Details of a smoke test that did not pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmokeTestFailed {
    /// Exit code, if the process exited normally.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// The process was killed after exceeding the timeout.
    pub timed_out: bool,
    /// The process could not be started at all.
    pub spawn_error: Option<String>,
}

impl fmt::Display for SmokeTestFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.spawn_error {
            return write!(f, "could not run executable: {err}");
        }
        if self.timed_out {
            return write!(f, "timed out");
        }
        match self.status {
            Some(code) => write!(f, "exited with status {code}")?,
            None => write!(f, "terminated by signal")?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {}", stderr.lines().next().unwrap_or_default())?;
        }
        Ok(())
    }
}

impl std::error::Error for SmokeTestFailed {}

/// Result of a smoke test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    /// The executable exited with status zero.
    Passed {
        /// Trimmed standard output (usually the version string).
        output: String,
    },
    /// Anything else.
    Failed(SmokeTestFailed),
}

impl SmokeOutcome {
    /// Whether the test passed.
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// Runs an executable with fixed arguments under a timeout.
#[derive(Debug, Clone)]
pub struct SmokeTester {
    args: Vec<String>,
    timeout: Duration,
}

impl Default for SmokeTester {
    fn default() -> Self {
        Self::new(vec!["--version".to_string()])
    }
}

impl SmokeTester {
    /// A tester passing `args` to the executable.
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            timeout: DEFAULT_SMOKE_TIMEOUT,
        }
    }

    /// Replace the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed to the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run `path` on a blocking thread.
    pub async fn run(&self, path: &Path) -> SmokeOutcome {
        let tester = self.clone();
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || tester.run_blocking(&path))
            .await
            .unwrap_or_else(|e| {
                SmokeOutcome::Failed(SmokeTestFailed {
                    spawn_error: Some(e.to_string()),
                    ..SmokeTestFailed::default()
                })
            })
    }

    /// Run `path` on the current thread.
    pub fn run_blocking(&self, path: &Path) -> SmokeOutcome {
        tracing::debug!(path = %path.display(), args = ?self.args, "running smoke test");

        let started = Instant::now();
        let mut child = match Command::new(path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "smoke test could not start");
                return SmokeOutcome::Failed(SmokeTestFailed {
                    spawn_error: Some(e.to_string()),
                    ..SmokeTestFailed::default()
                });
            }
        };

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let (status, timed_out) = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => (Some(status), false),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                (None, true)
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return SmokeOutcome::Failed(SmokeTestFailed {
                    spawn_error: Some(e.to_string()),
                    ..SmokeTestFailed::default()
                });
            }
        };

        // Grandchildren may still hold the pipes open; never wait on them
        // past the timeout.
        let deadline = if timed_out {
            Instant::now() + PIPE_GRACE
        } else {
            (started + self.timeout).max(Instant::now() + PIPE_GRACE)
        };
        let stdout = collect(stdout, deadline);
        let stderr = collect(stderr, deadline);

        match status {
            Some(status) if status.success() => SmokeOutcome::Passed {
                output: stdout.trim().to_string(),
            },
            status => {
                let failed = SmokeTestFailed {
                    status: status.as_ref().and_then(ExitStatus::code),
                    stdout,
                    stderr,
                    timed_out,
                    spawn_error: None,
                };
                tracing::warn!(path = %path.display(), reason = %failed, "smoke test failed");
                SmokeOutcome::Failed(failed)
            }
        }
    }
}

/// Output read so far from one pipe, plus a signal sent at end of stream.
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Drain {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let (tx, done) = mpsc::channel();
    let sink = Arc::clone(&buf);

    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => sink
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(&chunk[..n]),
            }
        }
        let _ = tx.send(());
    });

    Drain { buf, done }
}

fn collect(drain: Option<Drain>, deadline: Instant) -> String {
    let Some(drain) = drain else {
        return String::new();
    };
    let _ = drain
        .done
        .recv_timeout(deadline.saturating_duration_since(Instant::now()));
    let buf = drain.buf.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&buf).into_owned()
}
