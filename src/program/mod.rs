//! Resource programs.
//!
//! Unit entry points declare resources into a [`Program`], wire them
//! together through deferred [`Output`] values and read other units'
//! outputs through [`StackReference`]s. The rendered program is what the
//! provisioning engine applies.

mod document;
mod output;
mod stack_ref;

pub use document::{Program, Resource, ResourceHandle, ResourceOptions};
pub use output::{Output, OutputSource, Reference, Segment};
pub use stack_ref::{STACK_REFERENCE_TYPE, StackReference};
