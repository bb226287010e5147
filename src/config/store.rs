//! Per-stack configuration store.
//!
//! Reads the `config:` mapping of a `Pulumi.<stack>.yaml` file. Keys are
//! either namespaced (`project:key`) or bare.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{ConfigError, Result, StackyardError};

/// Key/value configuration of one stack.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigStore {
    /// Raw configuration values.
    #[serde(default)]
    config: Mapping,
}

impl ConfigStore {
    /// Creates a store from an in-memory mapping.
    #[must_use]
    pub const fn from_mapping(config: Mapping) -> Self {
        Self { config }
    }

    /// Loads a stack configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StackyardError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackyardError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        Self::parse(&content, Some(path))
    }

    /// Loads a stack configuration file, treating a missing file as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No stack configuration at {}, using empty config", path.display());
            Ok(Self::default())
        }
    }

    /// Parses a stack configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse(content: &str, source: Option<&Path>) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            StackyardError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Looks up a key, first as `<namespace>:<key>`, then bare.
    #[must_use]
    pub fn lookup(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.config
            .get(format!("{namespace}:{key}").as_str())
            .or_else(|| self.config.get(key))
            .filter(|value| !value.is_null())
    }

    /// Looks up a key under whichever namespace carries it, then bare.
    ///
    /// Used when reading another unit's stack file, whose project name is
    /// not known to the reader.
    #[must_use]
    pub fn lookup_any(&self, key: &str) -> Option<&Value> {
        let suffix = format!(":{key}");
        self.config
            .iter()
            .find(|(k, _)| k.as_str().is_some_and(|k| k.ends_with(&suffix)))
            .map(|(_, value)| value)
            .or_else(|| self.config.get(key))
            .filter(|value| !value.is_null())
    }

    /// Returns the number of configured keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.config.len()
    }

    /// Returns true if no keys are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_lookup_wins() {
        let yaml = r"
config:
  infra.network:external_network: public
  external_network: fallback
  default_router: router1
";
        let store = ConfigStore::parse(yaml, None).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.lookup("infra.network", "external_network"),
            Some(&Value::from("public"))
        );
        assert_eq!(
            store.lookup("infra.network", "default_router"),
            Some(&Value::from("router1"))
        );
        assert!(store.lookup("infra.network", "missing").is_none());
    }

    #[test]
    fn test_lookup_any_namespace() {
        let yaml = r"
config:
  infra.network:networks:
    - name: net1
      cidr: 10.0.0.0/24
";
        let store = ConfigStore::parse(yaml, None).unwrap();
        let networks = store.lookup_any("networks").unwrap();
        assert_eq!(networks[0]["cidr"], Value::from("10.0.0.0/24"));
        assert!(store.lookup_any("work").is_none());
    }

    #[test]
    fn test_empty_document() {
        let store = ConfigStore::parse("", None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigStore::load("/nonexistent/Pulumi.dev.yaml");
        assert!(matches!(
            result,
            Err(StackyardError::Config(ConfigError::FileNotFound { .. }))
        ));

        let store = ConfigStore::load_or_default("/nonexistent/Pulumi.dev.yaml").unwrap();
        assert!(store.is_empty());
    }
}
