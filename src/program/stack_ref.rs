//! Cross-stack references.
//!
//! A [`StackReference`] reads outputs published by another unit's stack.
//! Its outputs are always deferred; consumers project nested fields out of
//! them and the engine resolves them during apply.

use crate::error::Result;

use super::document::{Program, ResourceHandle};
use super::output::{Output, Reference, Segment};

/// Engine type token of a stack reference.
pub const STACK_REFERENCE_TYPE: &str = "pulumi:pulumi:StackReference";

/// A reference to another stack's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackReference {
    handle: ResourceHandle,
    stack_name: String,
}

impl StackReference {
    /// Declares a reference to `stack_name` (`<org>/<project>/<stack>`).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if `logical_name` is already declared.
    pub fn declare(program: &mut Program, logical_name: &str, stack_name: &str) -> Result<Self> {
        let handle = program.declare(
            logical_name,
            STACK_REFERENCE_TYPE,
            &serde_json::json!({ "name": stack_name }),
        )?;
        Ok(Self {
            handle,
            stack_name: stack_name.to_string(),
        })
    }

    /// Returns the fully-qualified name of the referenced stack.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Returns the logical name of the reference.
    #[must_use]
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Returns a named output of the referenced stack.
    #[must_use]
    pub fn output<T>(&self, name: &str) -> Output<T> {
        let outputs = Reference::new(self.handle.name(), "outputs");
        Output::Deferred(outputs.child(Segment::Key(name.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_output_projection() {
        let mut program = Program::new();
        let sg = StackReference::declare(&mut program, "default-sg", "organization/infra.sg.default/prod")
            .unwrap();

        let name: Output<String> = sg.output::<Value>("sg").get("name").unwrap();
        assert_eq!(
            serde_json::to_value(&name).unwrap(),
            serde_json::json!("${default-sg.outputs[\"sg\"][\"name\"]}")
        );
        assert_eq!(sg.stack_name(), "organization/infra.sg.default/prod");

        let resource = program.resource("default-sg").unwrap();
        assert_eq!(resource.type_token, STACK_REFERENCE_TYPE);
        assert_eq!(resource.properties["name"], "organization/infra.sg.default/prod");
    }
}
