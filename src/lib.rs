// ============================================================================
// Linting
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![warn(unused_imports)]
#![warn(unused_must_use)]
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]

// Clippy lints (warnings only)
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(clippy::todo)]
#![warn(clippy::unimplemented)]
#![warn(clippy::unwrap_in_result)]
#![warn(clippy::redundant_clone)]
#![warn(clippy::cognitive_complexity)]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackyard
//!
//! Validated OpenStack stack programs and ordered multi-stack deployments on
//! top of the Pulumi YAML runtime.
//!
//! ## Overview
//!
//! A project is a tree of units. Each unit directory holds a `Pulumi.yaml`
//! manifest and a `unit.yaml` entry point naming the program it renders:
//!
//! - `network`: networks, subnets and router interfaces
//! - `keys`: the operator's keypair
//! - `security-group`: the environment's default security group
//! - `instances`: a VM inventory wired to the other units through stack
//!   references
//!
//! Before each preview or update the unit's program is built from its stack
//! configuration, validated (CIDR prefix, DHCP pool, DNS, rule ports, fixed
//! addresses) and written to `Main.yaml`. Units under `infra/` are applied
//! before applications and destroyed after them.
//!
//! ## Modules
//!
//! - [`config`]: Stack context, configuration stores and unit files
//! - [`resources`]: Validated resource builders
//! - [`program`]: Deferred outputs, stack references and program rendering
//! - [`cloud`]: OpenStack catalog lookups
//! - [`cloud_init`]: Cloud-init user data
//! - [`assembly`]: VM assembly from inventory items
//! - [`units`]: Unit programs and rendering
//! - [`engine`]: Pulumi CLI driver
//! - [`sequencer`]: Unit discovery, ordering and execution
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # infra/network/Pulumi.dev.yaml
//! config:
//!   infra.network:external_network: public
//!   infra.network:default_router: router1
//!   infra.network:default_dns: ["8.8.8.8", "1.1.1.1"]
//!   infra.network:networks:
//!     - name: net1
//!       cidr: 10.0.0.0/24
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod assembly;
pub mod cli;
pub mod cloud;
pub mod cloud_init;
pub mod config;
pub mod engine;
pub mod error;
pub mod program;
pub mod resources;
pub mod sequencer;
pub mod units;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, OutputFormatter};
pub use config::{Config, ConfigParser, StackContext};
pub use engine::{Engine, Operation, PulumiCli};
pub use error::{Result, StackyardError};
pub use program::{Output, Program};
pub use sequencer::{Action, RunPlan, RunReport, Sequencer};
pub use units::{ProgramWriter, UnitRenderer};
