//! Command-line interface.

mod commands;
mod output;

pub use commands::{ActionArg, Cli, OutputFormat};
pub use output::OutputFormatter;
