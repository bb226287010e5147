//! Configuration module for Stackyard.
//!
//! This module handles all configuration-related functionality:
//! - The explicit deployment context of a unit
//! - Per-stack configuration stores and the typed resolver over them
//! - Parsing unit manifests and entry points
//! - Hashing rendered programs for change detection

mod context;
mod hash;
mod parser;
mod resolver;
mod store;

pub use context::{StackContext, StackInfo, stack_config_path};
pub use hash::ProgramHasher;
pub use parser::{
    ConfigParser, ENTRY_POINT_FILE, MANIFEST_FILE, PROGRAM_FILE, ProjectManifest, ReferenceSpec,
    UnitKind, UnitSpec,
};
pub use resolver::Config;
pub use store::ConfigStore;
