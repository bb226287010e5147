//! Security group unit: the environment's default group.

use serde_json::json;

use crate::config::Config;
use crate::error::{ResourceError, Result};
use crate::program::Program;
use crate::resources::{RuleSpec, SecurityGroup, SecurityGroupConfig, SecurityGroupRuleConfig};

/// Builds the default security group program.
///
/// Rules come from `sg_rules`, falling back to `default_sg_rules`.
///
/// # Errors
///
/// Returns configuration or rule validation errors.
pub fn build(config: &Config) -> Result<Program> {
    let stack = config.parse_stack().env_suffix;
    let name = format!("{stack}-sg-default");
    let rule_prefix = format!("{name}-rule");

    let specs: Vec<RuleSpec> = match config.get_object("sg_rules")? {
        Some(rules) => rules,
        None => config.require_object("default_sg_rules")?,
    };

    let rules = specs
        .iter()
        .map(|spec| SecurityGroupRuleConfig::from_spec(&rule_prefix, spec))
        .collect::<std::result::Result<Vec<_>, ResourceError>>()?;

    let sg_config = SecurityGroupConfig::new(name, rules)
        .with_description(config.get_str("description")?)
        .with_delete_default_rules(config.get_bool("delete_default_rules")?.unwrap_or(false));

    let mut program = Program::new();
    let sg = SecurityGroup::declare(&mut program, &sg_config)?;
    program.export(
        "sg",
        &json!({
            "name": sg.group.output::<String>("name"),
            "id": sg.group.id(),
        }),
    )?;
    Ok(program)
}
