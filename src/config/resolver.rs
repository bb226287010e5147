//! Typed configuration resolver.
//!
//! [`Config`] combines the [`StackContext`] with the stack's
//! [`ConfigStore`] and exposes required and optional lookups.

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::error::{ConfigError, Result};

use super::context::{StackContext, StackInfo};
use super::store::ConfigStore;

/// Configuration resolver for one unit.
#[derive(Debug, Clone)]
pub struct Config {
    /// Optional namespace; defaults to the project name.
    name: Option<String>,
    /// Deployment context.
    context: StackContext,
    /// Backing store.
    store: ConfigStore,
}

impl Config {
    /// Creates a resolver over an already loaded store.
    #[must_use]
    pub fn new(context: StackContext, store: ConfigStore, name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            context,
            store,
        }
    }

    /// Loads the stack configuration file named by the context.
    ///
    /// A stack without a configuration file has an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(context: &StackContext, name: Option<&str>) -> Result<Self> {
        let store = ConfigStore::load_or_default(context.config_path())?;
        Ok(Self::new(context.clone(), store, name))
    }

    /// Returns the deployment context.
    #[must_use]
    pub const fn context(&self) -> &StackContext {
        &self.context
    }

    /// Returns the lookup namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.context.project())
    }

    /// Returns the fully-qualified name prefix, `<name-or-project>-<stack>`.
    #[must_use]
    pub fn fullname(&self) -> String {
        format!("{}-{}", self.namespace(), self.context.stack())
    }

    /// Derives the stack naming information.
    #[must_use]
    pub fn parse_stack(&self) -> StackInfo {
        StackInfo::new(self.fullname(), self.context.stack(), self.context.project())
    }

    /// Returns the raw value of a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is an encrypted secret.
    fn raw(&self, key: &str) -> Result<Option<&Value>> {
        let value = self.store.lookup(self.namespace(), key);
        if let Some(Value::Mapping(map)) = value {
            if map.contains_key("secure") {
                return Err(ConfigError::invalid(
                    key,
                    "encrypted values must be decrypted by the engine",
                )
                .into());
            }
        }
        Ok(value)
    }

    /// Gets an optional string value. Scalars are converted to strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is a list or mapping.
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.raw(key)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(ConfigError::invalid(key, "expected a string").into()),
        }
    }

    /// Gets a required string value.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfiguration` if the key is absent.
    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key)?
            .ok_or_else(|| ConfigError::missing(self.qualified(key)).into())
    }

    /// Gets an optional boolean value.
    ///
    /// Accepts YAML booleans and the usual truthy/falsy strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.raw(key)? {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => parse_bool(s)
                .map(Some)
                .ok_or_else(|| ConfigError::invalid(key, format!("invalid truth value '{s}'")).into()),
            Some(_) => Err(ConfigError::invalid(key, "expected a boolean").into()),
        }
    }

    /// Gets a required boolean value.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfiguration` if the key is absent.
    pub fn require_bool(&self, key: &str) -> Result<bool> {
        self.get_bool(key)?
            .ok_or_else(|| ConfigError::missing(self.qualified(key)).into())
    }

    /// Gets an optional structured value.
    ///
    /// A string value is parsed as JSON, which is how structured values set
    /// through the engine's command line are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be deserialized into `T`.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.raw(key)? else {
            return Ok(None);
        };

        let parsed: T = match value {
            Value::String(s) => serde_json::from_str(s)
                .map_err(|e| ConfigError::invalid(key, format!("invalid JSON: {e}")))?,
            other => serde_yaml::from_value(other.clone())
                .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
        };

        Ok(Some(parsed))
    }

    /// Gets a required structured value.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfiguration` if the key is absent.
    pub fn require_object<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_object(key)?
            .ok_or_else(|| ConfigError::missing(self.qualified(key)).into())
    }

    /// Gets a list of strings; an absent key is an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a list of strings.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.get_object::<Vec<String>>(key)?.unwrap_or_default())
    }

    fn qualified(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace())
    }
}

/// Parses a truthy or falsy string.
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}
