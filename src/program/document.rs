//! Resource program documents.
//!
//! A [`Program`] collects declared resources and exported outputs in
//! declaration order and renders them as a document for the engine's YAML
//! runtime.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, Result, StackyardError};

use super::output::Output;

/// Header written at the top of every rendered program.
const PROGRAM_HEADER: &str = "# Rendered by stackyard. Edits are overwritten on the next run.\n";

/// Resource options understood by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Delete the old resource before creating its replacement.
    pub delete_before_replace: bool,
    /// Properties whose changes are ignored on update.
    pub ignore_changes: Vec<String>,
}

impl ResourceOptions {
    /// Options with delete-before-replace set.
    #[must_use]
    pub fn delete_before_replace() -> Self {
        Self {
            delete_before_replace: true,
            ..Self::default()
        }
    }

    /// Options ignoring changes to the given properties.
    #[must_use]
    pub fn ignore_changes(properties: &[&str]) -> Self {
        Self {
            ignore_changes: properties.iter().map(|p| (*p).to_string()).collect(),
            ..Self::default()
        }
    }

    const fn is_empty(&self) -> bool {
        !self.delete_before_replace && self.ignore_changes.is_empty()
    }

    fn to_value(&self) -> Value {
        let mut options = serde_json::Map::new();
        if self.delete_before_replace {
            options.insert(String::from("deleteBeforeReplace"), Value::Bool(true));
        }
        if !self.ignore_changes.is_empty() {
            options.insert(
                String::from("ignoreChanges"),
                Value::from(self.ignore_changes.clone()),
            );
        }
        Value::Object(options)
    }
}

/// A declared resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Logical name.
    pub name: String,
    /// Engine type token.
    pub type_token: String,
    /// Input properties.
    pub properties: Value,
    /// Resource options.
    pub options: ResourceOptions,
}

/// Handle to a declared resource, used to reference its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    /// Returns the logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// References an output property of the resource.
    #[must_use]
    pub fn output<T>(&self, property: &str) -> Output<T> {
        Output::deferred(self.name.clone(), property)
    }

    /// References the resource id.
    #[must_use]
    pub fn id(&self) -> Output<String> {
        self.output("id")
    }
}

/// An ordered resource program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    resources: Vec<Resource>,
    outputs: Vec<(String, Value)>,
    names: HashSet<String>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a resource with default options.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the logical name is taken.
    pub fn declare(
        &mut self,
        name: &str,
        type_token: &str,
        properties: &impl Serialize,
    ) -> Result<ResourceHandle> {
        self.declare_with(name, type_token, properties, ResourceOptions::default())
    }

    /// Declares a resource.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the logical name is taken, or an internal
    /// error if the properties do not serialize to a mapping.
    pub fn declare_with(
        &mut self,
        name: &str,
        type_token: &str,
        properties: &impl Serialize,
        options: ResourceOptions,
    ) -> Result<ResourceHandle> {
        if !self.names.insert(name.to_string()) {
            return Err(ConfigError::DuplicateName {
                resource_type: type_token.to_string(),
                name: name.to_string(),
            }
            .into());
        }

        let properties = serde_json::to_value(properties)
            .map_err(|e| StackyardError::internal(format!("Cannot serialize {name}: {e}")))?;
        if !properties.is_object() {
            return Err(StackyardError::internal(format!(
                "Properties of {name} must be a mapping"
            )));
        }

        debug!("Declared {} {}", type_token, name);
        self.resources.push(Resource {
            name: name.to_string(),
            type_token: type_token.to_string(),
            properties,
            options,
        });

        Ok(ResourceHandle {
            name: name.to_string(),
        })
    }

    /// Exports a stack output.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the output is already exported.
    pub fn export(&mut self, name: &str, value: &impl Serialize) -> Result<()> {
        if self.outputs.iter().any(|(existing, _)| existing == name) {
            return Err(ConfigError::DuplicateName {
                resource_type: String::from("output"),
                name: name.to_string(),
            }
            .into());
        }

        let value = serde_json::to_value(value)
            .map_err(|e| StackyardError::internal(format!("Cannot serialize output {name}: {e}")))?;
        self.outputs.push((name.to_string(), value));
        Ok(())
    }

    /// Returns the declared resources in order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Finds a declared resource by logical name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Returns an exported output.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Renders the program for the engine's YAML runtime.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the document cannot be serialized.
    pub fn to_yaml(&self) -> Result<String> {
        let mut resources = serde_yaml::Mapping::new();
        for resource in &self.resources {
            let mut entry = serde_yaml::Mapping::new();
            entry.insert("type".into(), resource.type_token.clone().into());
            entry.insert("properties".into(), to_yaml_value(&resource.properties)?);
            if !resource.options.is_empty() {
                entry.insert("options".into(), to_yaml_value(&resource.options.to_value())?);
            }
            resources.insert(resource.name.clone().into(), serde_yaml::Value::Mapping(entry));
        }

        let mut outputs = serde_yaml::Mapping::new();
        for (name, value) in &self.outputs {
            outputs.insert(name.clone().into(), to_yaml_value(value)?);
        }

        let mut document = serde_yaml::Mapping::new();
        document.insert("resources".into(), serde_yaml::Value::Mapping(resources));
        document.insert("outputs".into(), serde_yaml::Value::Mapping(outputs));

        let body = serde_yaml::to_string(&document)
            .map_err(|e| StackyardError::internal(format!("Cannot render program: {e}")))?;
        Ok(format!("{PROGRAM_HEADER}{body}"))
    }
}

fn to_yaml_value(value: &Value) -> Result<serde_yaml::Value> {
    serde_yaml::to_value(value)
        .map_err(|e| StackyardError::internal(format!("Cannot convert value: {e}")))
}
