//! Parsers for unit manifests and entry points.
//!
//! A unit directory holds the engine manifest (`Pulumi.yaml`) and the
//! `unit.yaml` entry point that names the program the unit renders.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, Result, StackyardError};

/// Engine manifest file name.
pub const MANIFEST_FILE: &str = "Pulumi.yaml";

/// Unit entry point file name.
pub const ENTRY_POINT_FILE: &str = "unit.yaml";

/// Rendered program file name, read by the engine's YAML runtime.
pub const PROGRAM_FILE: &str = "Main.yaml";

/// Engine project manifest (`Pulumi.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectManifest {
    /// Project name.
    pub name: String,
    /// Runtime, either a bare name or `{name, options}`.
    #[serde(default)]
    pub runtime: Option<serde_yaml::Value>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectManifest {
    /// Returns the runtime name, if declared.
    #[must_use]
    pub fn runtime_name(&self) -> Option<&str> {
        match self.runtime.as_ref()? {
            serde_yaml::Value::String(name) => Some(name),
            serde_yaml::Value::Mapping(map) => map.get("name").and_then(serde_yaml::Value::as_str),
            _ => None,
        }
    }
}

/// The kind of program a unit renders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    /// Networks, subnets and router interfaces.
    Network,
    /// Operator keypair.
    Keys,
    /// Default security group.
    SecurityGroup,
    /// VM inventory.
    Instances,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Keys => "keys",
            Self::SecurityGroup => "security-group",
            Self::Instances => "instances",
        };
        f.write_str(name)
    }
}

/// Unit entry point (`unit.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitSpec {
    /// Program kind.
    pub kind: UnitKind,
    /// Organization that owns referenced stacks.
    #[serde(default = "default_organization")]
    pub organization: String,
    /// Cross-stack references (instances units).
    #[serde(default)]
    pub references: ReferenceSpec,
    /// Cloud-init document, relative to the unit directory.
    #[serde(default)]
    pub cloud_init: Option<PathBuf>,
    /// Network unit whose stack file records subnet CIDRs.
    #[serde(default = "default_network_config_dir")]
    pub network_config_dir: PathBuf,
}

/// Stack reference templates; `{stack}` is replaced by the target stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceSpec {
    /// Network unit stack.
    #[serde(default = "default_network_ref")]
    pub network: String,
    /// Default security group unit stack.
    #[serde(default = "default_security_group_ref")]
    pub security_group: String,
    /// Keypair unit stack, if any.
    #[serde(default = "default_keypair_ref")]
    pub keypair: Option<String>,
}

impl Default for ReferenceSpec {
    fn default() -> Self {
        Self {
            network: default_network_ref(),
            security_group: default_security_group_ref(),
            keypair: default_keypair_ref(),
        }
    }
}

impl ReferenceSpec {
    /// Expands a reference template into `<org>/<project>/<stack>`.
    #[must_use]
    pub fn expand(template: &str, organization: &str, stack: &str) -> String {
        format!("{organization}/{}", template.replace("{stack}", stack))
    }
}

fn default_organization() -> String {
    String::from("organization")
}

fn default_network_config_dir() -> PathBuf {
    PathBuf::from("../../infra/network")
}

fn default_network_ref() -> String {
    String::from("infra.network/{stack}")
}

fn default_security_group_ref() -> String {
    String::from("infra.sg.default/prod")
}

#[allow(clippy::unnecessary_wraps)]
fn default_keypair_ref() -> Option<String> {
    Some(String::from("infra.keys/prod"))
}

/// Parser for unit files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate the `.env` file.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the manifest of a unit directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or malformed.
    pub fn load_manifest(&self, unit_dir: &Path) -> Result<ProjectManifest> {
        let path = unit_dir.join(MANIFEST_FILE);
        let content = read_file(&path)?;
        let manifest: ProjectManifest = parse_yaml(&content, &path)?;

        if manifest.name.trim().is_empty() {
            return Err(ConfigError::validation("Project name cannot be empty", "name").into());
        }

        if manifest.runtime_name() != Some("yaml") {
            return Err(ConfigError::validation(
                format!(
                    "Unit {} must use the yaml runtime, found {}",
                    unit_dir.display(),
                    manifest.runtime_name().unwrap_or("none")
                ),
                "runtime",
            )
            .into());
        }

        debug!("Loaded manifest for project: {}", manifest.name);
        Ok(manifest)
    }

    /// Loads the entry point of a unit directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry point is missing or malformed.
    pub fn load_unit(&self, unit_dir: &Path) -> Result<UnitSpec> {
        let path = unit_dir.join(ENTRY_POINT_FILE);
        let content = read_file(&path)?;
        parse_yaml(&content, &path)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StackyardError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(StackyardError::Config(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }));
    }

    std::fs::read_to_string(path).map_err(|e| {
        StackyardError::Config(ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}

fn parse_yaml<T: serde::de::DeserializeOwned>(content: &str, path: &Path) -> Result<T> {
    serde_yaml::from_str(content).map_err(|e| {
        StackyardError::Config(ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_unit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ENTRY_POINT_FILE), "kind: network\n").unwrap();

        let unit = ConfigParser::new().load_unit(dir.path()).unwrap();
        assert_eq!(unit.kind, UnitKind::Network);
        assert_eq!(unit.organization, "organization");
        assert_eq!(unit.references.network, "infra.network/{stack}");
        assert_eq!(unit.references.keypair.as_deref(), Some("infra.keys/prod"));
        assert_eq!(unit.network_config_dir, PathBuf::from("../../infra/network"));
    }

    #[test]
    fn test_parse_instances_unit() {
        let yaml = r"
kind: instances
organization: acme
references:
  network: infra.network/{stack}
  security_group: infra.sg.default/{stack}
  keypair: null
cloud_init: cloud_init.yaml
";
        let unit: UnitSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(unit.kind, UnitKind::Instances);
        assert!(unit.references.keypair.is_none());
        assert_eq!(
            ReferenceSpec::expand(&unit.references.security_group, &unit.organization, "dev"),
            "acme/infra.sg.default/dev"
        );
    }

    #[test]
    fn test_manifest_requires_yaml_runtime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "name: infra.network\nruntime: python\n").unwrap();
        assert!(ConfigParser::new().load_manifest(dir.path()).is_err());

        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "name: infra.network\nruntime:\n  name: yaml\n",
        )
        .unwrap();
        let manifest = ConfigParser::new().load_manifest(dir.path()).unwrap();
        assert_eq!(manifest.name, "infra.network");
        assert_eq!(manifest.runtime_name(), Some("yaml"));
    }

    #[test]
    fn test_missing_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigParser::new().load_unit(dir.path());
        assert!(matches!(
            result,
            Err(StackyardError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
