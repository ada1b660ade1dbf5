// ── Command execution ──
//
// Every system tool netloc touches is run through `Exec`, so providers
// can be exercised against scripted output. `ProcessRunner` is the real
// implementation: argv only (never a shell), bounded by a timeout, and
// the child is killed if the future is dropped.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::SystemError;

/// One program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl CommandLine {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Wrap in non-interactive `sudo` when `sudo` is set. `-n` makes a
    /// missing sudoers rule fail fast instead of prompting.
    pub fn privileged(self, sudo: bool) -> Self {
        if !sudo {
            return self;
        }
        let mut args = vec!["-n".to_owned(), self.program];
        args.extend(self.args);
        Self {
            program: "sudo".to_owned(),
            args,
            stdin: self.stdin,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Runs a command and returns its stdout.
#[async_trait]
pub trait Exec: Send + Sync {
    async fn run(&self, cmd: &CommandLine) -> Result<String, SystemError>;
}

/// Spawns real processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Exec for ProcessRunner {
    async fn run(&self, cmd: &CommandLine) -> Result<String, SystemError> {
        debug!(command = %cmd, "running");
        let spawn_err = |source| SystemError::Spawn {
            program: cmd.program.clone(),
            source,
        };

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let (Some(input), Some(mut stdin)) = (&cmd.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await.map_err(spawn_err)?;
            // Dropping the handle closes the pipe so the child sees EOF.
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SystemError::Timeout {
                program: cmd.program.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(spawn_err)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            debug!(command = %cmd, status = %output.status, %stderr, "command failed");
            return Err(SystemError::Failed {
                program: cmd.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Scripted runner for tests ───────────────────────────────────────
