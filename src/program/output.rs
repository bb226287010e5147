//! Deferred output values.
//!
//! An [`Output`] is either a value known at declaration time or a reference
//! to a property of another resource that only the engine can resolve during
//! apply. References can be projected (`get`, `index`) without being read;
//! they render as `${resource.property["key"]}` interpolations.

use std::collections::HashMap;
use std::fmt::Write;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::error::{Result, StackyardError};

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Top-level resource property.
    Property(String),
    /// Map key.
    Key(String),
    /// List index.
    Index(usize),
}

/// A path into the state of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Logical name of the resource.
    resource: String,
    /// Property path below the resource.
    path: Vec<Segment>,
}

impl Reference {
    /// Creates a reference to a top-level property of a resource.
    #[must_use]
    pub fn new(resource: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            path: vec![Segment::Property(property.into())],
        }
    }

    /// Returns the logical name of the referenced resource.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the property path.
    #[must_use]
    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    /// Extends the path by one segment.
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self {
            resource: self.resource.clone(),
            path,
        }
    }

    /// Renders the reference as an engine interpolation expression.
    #[must_use]
    pub fn expression(&self) -> String {
        let mut expr = format!("${{{}", self.resource);
        for segment in &self.path {
            match segment {
                Segment::Property(name) => {
                    let _ = write!(expr, ".{name}");
                }
                Segment::Key(key) => {
                    let _ = write!(expr, "[\"{key}\"]");
                }
                Segment::Index(index) => {
                    let _ = write!(expr, "[{index}]");
                }
            }
        }
        expr.push('}');
        expr
    }
}

/// A value that may only be known once the engine applies the program.
#[derive(Debug, Clone, PartialEq)]
pub enum Output<T> {
    /// Known at declaration time.
    Known(T),
    /// Resolved by the engine.
    Deferred(Reference),
}

/// Source of resolved resource state, keyed by logical resource name.
pub trait OutputSource {
    /// Returns the resolved state of a resource, if available.
    fn resource_state(&self, resource: &str) -> Option<&serde_json::Value>;
}

impl OutputSource for HashMap<String, serde_json::Value> {
    fn resource_state(&self, resource: &str) -> Option<&serde_json::Value> {
        self.get(resource)
    }
}

impl<T> Output<T> {
    /// Wraps a known value.
    pub const fn known(value: T) -> Self {
        Self::Known(value)
    }

    /// References a property of a declared resource.
    #[must_use]
    pub fn deferred(resource: impl Into<String>, property: impl Into<String>) -> Self {
        Self::Deferred(Reference::new(resource, property))
    }

    /// Returns the reference, if the value is deferred.
    #[must_use]
    pub const fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Known(_) => None,
            Self::Deferred(reference) => Some(reference),
        }
    }
}

impl<T: Serialize> Output<T> {
    /// Projects a map key out of the value.
    ///
    /// # Errors
    ///
    /// Returns an error if a known value cannot be converted into `U`.
    pub fn get<U: DeserializeOwned>(&self, key: &str) -> Result<Output<U>> {
        self.project(Segment::Key(key.to_string()), |value| value.get(key).cloned())
    }

    /// Projects a list element out of the value.
    ///
    /// # Errors
    ///
    /// Returns an error if a known value cannot be converted into `U`.
    pub fn index<U: DeserializeOwned>(&self, index: usize) -> Result<Output<U>> {
        self.project(Segment::Index(index), |value| value.get(index).cloned())
    }

    fn project<U: DeserializeOwned>(
        &self,
        segment: Segment,
        pick: impl FnOnce(&serde_json::Value) -> Option<serde_json::Value>,
    ) -> Result<Output<U>> {
        match self {
            Self::Deferred(reference) => Ok(Output::Deferred(reference.child(segment))),
            Self::Known(value) => {
                let value = serde_json::to_value(value)
                    .map_err(|e| StackyardError::internal(format!("Cannot serialize output: {e}")))?;
                let picked = pick(&value).unwrap_or(serde_json::Value::Null);
                serde_json::from_value(picked)
                    .map(Output::Known)
                    .map_err(|e| StackyardError::internal(format!("Cannot project output: {e}")))
            }
        }
    }
}

impl<T: DeserializeOwned + Clone> Output<T> {
    /// Resolves the value against resolved resource state.
    ///
    /// # Errors
    ///
    /// Returns an error if the referenced state is missing or has the wrong
    /// shape.
    pub fn resolve(&self, source: &impl OutputSource) -> Result<T> {
        let reference = match self {
            Self::Known(value) => return Ok(value.clone()),
            Self::Deferred(reference) => reference,
        };

        let missing = || {
            StackyardError::internal(format!("Output {} is not available", reference.expression()))
        };

        let mut current = source.resource_state(reference.resource()).ok_or_else(missing)?;
        for segment in reference.path() {
            current = match segment {
                Segment::Property(name) | Segment::Key(name) => current.get(name.as_str()),
                Segment::Index(index) => current.get(*index),
            }
            .ok_or_else(missing)?;
        }

        serde_json::from_value(current.clone()).map_err(|e| {
            StackyardError::internal(format!("Output {} has the wrong shape: {e}", reference.expression()))
        })
    }
}

impl<T: Serialize> Serialize for Output<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Known(value) => value.serialize(serializer),
            Self::Deferred(reference) => serializer.serialize_str(&reference.expression()),
        }
    }
}

impl<T> From<T> for Output<T> {
    fn from(value: T) -> Self {
        Self::Known(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_rendering() {
        let sg: Output<serde_json::Value> = Output::Deferred(Reference {
            resource: String::from("sg-ref"),
            path: vec![
                Segment::Property(String::from("outputs")),
                Segment::Key(String::from("sg")),
            ],
        });
        let name: Output<String> = sg.get("name").unwrap();
        assert_eq!(
            name.as_reference().unwrap().expression(),
            "${sg-ref.outputs[\"sg\"][\"name\"]}"
        );

        let first: Output<serde_json::Value> = Output::<serde_json::Value>::deferred("vm", "networks")
            .index(0)
            .unwrap();
        assert_eq!(first.as_reference().unwrap().expression(), "${vm.networks[0]}");
    }

    #[test]
    fn test_known_projection() {
        let value = Output::known(json!({"keypair": {"id": "kp-1"}}));
        let keypair: Output<serde_json::Value> = value.get("keypair").unwrap();
        let id: Output<String> = keypair.get("id").unwrap();
        assert_eq!(id, Output::Known(String::from("kp-1")));
    }

    #[test]
    fn test_serialize_deferred_as_interpolation() {
        let id: Output<String> = Output::deferred("dev-vm-web1", "id");
        let rendered = serde_json::to_value(&id).unwrap();
        assert_eq!(rendered, json!("${dev-vm-web1.id}"));

        let known: Output<String> = Output::known(String::from("abc"));
        assert_eq!(serde_json::to_value(&known).unwrap(), json!("abc"));
    }

    #[test]
    fn test_resolve_against_state() {
        let mut state = HashMap::new();
        state.insert(
            String::from("net-ref"),
            json!({"outputs": {"external_network_name": "public", "networks": [{"name": "dev-net1"}]}}),
        );

        let outputs: Output<serde_json::Value> = Output::deferred("net-ref", "outputs");
        let external: Output<String> = outputs.get("external_network_name").unwrap();
        assert_eq!(external.resolve(&state).unwrap(), "public");

        let networks: Output<serde_json::Value> = outputs.get("networks").unwrap();
        let first: Output<serde_json::Value> = networks.index(0).unwrap();
        let name: Output<String> = first.get("name").unwrap();
        assert_eq!(name.resolve(&state).unwrap(), "dev-net1");

        let missing: Output<String> = outputs.get("keypair").unwrap();
        assert!(missing.resolve(&state).is_err());
    }
}
