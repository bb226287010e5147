//! Instances unit: the VM inventory of an application.

use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use crate::assembly::{Defaults, InventoryItem, UnitReferences, VmAssembler};
use crate::cloud::LookupCache;
use crate::cloud_init::{discover_public_key, render_file};
use crate::config::{Config, ReferenceSpec, UnitSpec};
use crate::error::Result;
use crate::program::{Output, Program, StackReference};

/// Builds the instances program.
///
/// # Errors
///
/// Returns configuration, lookup, placement or validation errors.
pub async fn build(unit: &UnitSpec, config: &Config, lookups: &LookupCache) -> Result<Program> {
    let stack = config.parse_stack().env_suffix;
    let work_dir = config.context().work_dir().to_path_buf();

    let inventory: Vec<InventoryItem> = config.require_object("inventory")?;
    let defaults = Defaults::from_config(config)?;

    let mut program = Program::new();
    let org = &unit.organization;
    let refs = &unit.references;
    let references = UnitReferences {
        network: StackReference::declare(
            &mut program,
            "network-stack",
            &ReferenceSpec::expand(&refs.network, org, &stack),
        )?,
        security_group: StackReference::declare(
            &mut program,
            "security-group-stack",
            &ReferenceSpec::expand(&refs.security_group, org, &stack),
        )?,
        keypair: refs
            .keypair
            .as_deref()
            .map(|template| {
                StackReference::declare(&mut program, "keypair-stack", &ReferenceSpec::expand(template, org, &stack))
            })
            .transpose()?,
    };

    let mut assembler = VmAssembler::new(
        stack.clone(),
        defaults,
        references,
        lookups,
        work_dir.join(&unit.network_config_dir),
    );

    let mut cloud_init = None;
    if let Some(path) = &unit.cloud_init {
        let key_file = config.get_str("ssh_public_key_file")?.map(PathBuf::from);
        let public_key = discover_public_key(key_file.as_deref());
        let user_data = render_file(&work_dir.join(path), public_key.as_deref())?;
        assembler.set_user_data(Output::known(user_data.encoded.clone()));
        cloud_init = Some(user_data.encoded);
    }

    let mut instances: Vec<Value> = Vec::with_capacity(inventory.len());
    for item in &inventory {
        let vm = assembler.assemble(&mut program, item).await?;
        instances.push(vm.summary()?);
    }
    info!("Declared {} VMs for stack {}", instances.len(), stack);

    program.export("instances", &instances)?;
    if let Some(encoded) = cloud_init {
        program.export("cloud-init", &encoded)?;
    }
    Ok(program)
}
