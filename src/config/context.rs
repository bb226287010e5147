//! Explicit deployment context for a unit run.
//!
//! Every unit program receives a [`StackContext`] naming the project, the
//! target stack and the unit directory instead of reading ambient globals.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// The deployment context of a single unit invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackContext {
    /// Project name from the unit manifest.
    project: String,
    /// Target stack (environment) name.
    stack: String,
    /// Unit directory.
    work_dir: PathBuf,
}

impl StackContext {
    /// Creates a new stack context.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        stack: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project: project.into(),
            stack: stack.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Returns the project name.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the stack name.
    #[must_use]
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Returns the unit directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Returns the path of this stack's configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        stack_config_path(&self.work_dir, &self.stack)
    }
}

/// Returns the per-stack configuration file path inside a unit directory.
#[must_use]
pub fn stack_config_path(dir: &Path, stack: &str) -> PathBuf {
    dir.join(format!("Pulumi.{stack}.yaml"))
}

/// Naming information derived once per unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackInfo {
    /// Fully-qualified prefix, `<name-or-project>-<stack>`.
    pub fullname: String,
    /// Stack name as given.
    pub stack: String,
    /// Project name as given.
    pub project: String,
    /// Lower-cased project name.
    pub env_prefix: String,
    /// Lower-cased stack name.
    pub env_suffix: String,
}

impl StackInfo {
    /// Creates stack info, deriving the lower-cased prefix and suffix.
    #[must_use]
    pub fn new(fullname: impl Into<String>, stack: &str, project: &str) -> Self {
        Self {
            fullname: fullname.into(),
            stack: stack.to_string(),
            project: project.to_string(),
            env_prefix: project.to_lowercase(),
            env_suffix: stack.to_lowercase(),
        }
    }
}
