//! CLI argument definitions.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::engine::DEFAULT_ENGINE_BINARY;
use crate::sequencer::{Action, DEFAULT_EXCLUDES};

/// Stackyard - ordered OpenStack stack deployments.
#[derive(Parser, Debug)]
#[command(name = "stackyard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Environment (stack) name.
    #[arg(short, long, default_value = "dev", env = "STACKYARD_ENV")]
    pub env: String,

    /// Action to perform on every unit.
    #[arg(short, long, value_enum, default_value_t = ActionArg::Preview)]
    pub action: ActionArg,

    /// Run only infrastructure units (up and preview).
    #[arg(long)]
    pub infra_only: bool,

    /// Project root holding the units.
    #[arg(long, default_value = ".", env = "STACKYARD_ROOT")]
    pub root: PathBuf,

    /// Unit paths, relative to the root, left out of the run.
    #[arg(long = "exclude", value_name = "REL_PATH")]
    pub exclude: Vec<String>,

    /// Engine binary.
    #[arg(long, default_value = DEFAULT_ENGINE_BINARY, env = "STACKYARD_PULUMI")]
    pub pulumi_bin: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

impl Cli {
    /// Returns the exclusions, falling back to the defaults.
    #[must_use]
    pub fn excludes(&self) -> Vec<String> {
        if self.exclude.is_empty() {
            DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect()
        } else {
            self.exclude.clone()
        }
    }
}

/// Action argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Refresh, then apply.
    Up,
    /// Dry-run diff.
    Preview,
    /// Tear down.
    Destroy,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Up => Self::Up,
            ActionArg::Preview => Self::Preview,
            ActionArg::Destroy => Self::Destroy,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}
