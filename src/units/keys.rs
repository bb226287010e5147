//! Keys unit: the operator's keypair.

use std::path::PathBuf;

use serde_json::json;
use tracing::info;

use crate::cloud_init::{default_public_key_path, discover_public_key};
use crate::config::Config;
use crate::error::{PlacementError, Result};
use crate::program::Program;
use crate::resources::{KeypairConfig, declare_keypair};

/// Builds the keys program.
///
/// Nothing is declared unless `home_key` is set.
///
/// # Errors
///
/// Returns `SshKeyNotFound` if no public key can be read.
pub fn build(config: &Config) -> Result<Program> {
    let mut program = Program::new();
    if !config.get_bool("home_key")?.unwrap_or(false) {
        info!("home_key is not set, no keypair declared");
        return Ok(program);
    }

    let explicit = config.get_str("ssh_public_key_file")?.map(PathBuf::from);
    let public_key = discover_public_key(explicit.as_deref()).ok_or_else(|| PlacementError::SshKeyNotFound {
        path: explicit
            .clone()
            .or_else(default_public_key_path)
            .unwrap_or_else(|| PathBuf::from("~/.ssh/id_rsa.pub")),
    })?;

    let stack = config.parse_stack().env_suffix;
    let name = format!("{stack}-{}-keypair", operator_name());
    let keypair = declare_keypair(&mut program, &KeypairConfig::new(name, &public_key)?)?;

    program.export(
        "keypair",
        &json!({
            "id": keypair.id(),
            "name": keypair.output::<String>("name"),
        }),
    )?;
    Ok(program)
}

/// Name of the operator, taken from the home directory.
fn operator_name() -> String {
    dirs::home_dir()
        .and_then(|home| home.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| String::from("operator"))
}
