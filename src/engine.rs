//! Provisioning engine driver.
//!
//! Units are provisioned by the Pulumi CLI. Its output is streamed line by
//! line to the terminal while it runs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// Default engine binary.
pub const DEFAULT_ENGINE_BINARY: &str = "pulumi";

/// An engine operation on one stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Dry-run diff.
    Preview,
    /// Reconcile state with the cloud.
    Refresh,
    /// Apply the program.
    Up,
    /// Tear the stack down.
    Destroy,
}

impl Operation {
    /// Engine sub-command and flags.
    #[must_use]
    pub const fn args(self) -> &'static [&'static str] {
        match self {
            Self::Preview => &["preview"],
            Self::Refresh => &["refresh", "--yes"],
            Self::Up => &["up", "--yes"],
            Self::Destroy => &["destroy", "--yes"],
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.args()[0])
    }
}

/// The provisioning engine.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Selects the stack in `work_dir`, creating it if needed.
    async fn select_stack(&self, work_dir: &Path, stack: &str) -> Result<()>;

    /// Runs an operation on the stack in `work_dir`.
    async fn run(&self, operation: Operation, work_dir: &Path, stack: &str) -> Result<()>;
}

/// Engine backed by the Pulumi CLI.
#[derive(Debug, Clone)]
pub struct PulumiCli {
    binary: PathBuf,
}

impl Default for PulumiCli {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_BINARY)
    }
}

impl PulumiCli {
    /// Creates a driver for the given binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Returns the engine binary.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.binary.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Runs the binary in `work_dir`, streaming its output.
    async fn execute(&self, work_dir: &Path, args: Vec<String>) -> Result<()> {
        let command = self.command_line(&args);
        debug!("Running {} in {}", command, work_dir.display());

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::SpawnFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{line}");
                }
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                println!("{line}");
            }
        }

        let status = child.wait().await?;
        if let Some(task) = stderr_task {
            if let Err(e) = task.await {
                warn!("stderr reader of {} failed: {}", command, e);
            }
        }

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::CommandFailed {
                command,
                work_dir: work_dir.to_path_buf(),
                code: status.code(),
            }
            .into())
        }
    }
}

#[async_trait]
impl Engine for PulumiCli {
    async fn select_stack(&self, work_dir: &Path, stack: &str) -> Result<()> {
        let args = ["stack", "select", "--create", stack]
            .into_iter()
            .map(String::from)
            .collect();
        self.execute(work_dir, args).await
    }

    async fn run(&self, operation: Operation, work_dir: &Path, stack: &str) -> Result<()> {
        info!("{} {} ({})", operation, work_dir.display(), stack);
        let mut args: Vec<String> = operation.args().iter().map(|a| (*a).to_string()).collect();
        args.push(String::from("--stack"));
        args.push(stack.to_string());
        self.execute(work_dir, args).await
    }
}
