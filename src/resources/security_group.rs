//! Security group and rule builders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};
use crate::program::{Output, Program, ResourceHandle, ResourceOptions};

use super::address::parse_network;
use super::{SECURITY_GROUP_RULE_TYPE, SECURITY_GROUP_TYPE};

/// Remote prefix used when a rule does not name one.
pub const DEFAULT_REMOTE_PREFIX: &str = "0.0.0.0/0";

/// Traffic direction of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Inbound traffic.
    #[default]
    Ingress,
    /// Outbound traffic.
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => f.write_str("ingress"),
            Self::Egress => f.write_str("egress"),
        }
    }
}

/// IP protocol of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    #[default]
    Tcp,
    /// UDP.
    Udp,
    /// ICMP.
    Icmp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
            Self::Icmp => f.write_str("icmp"),
        }
    }
}

/// Ethertype of a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ethertype {
    /// IPv4.
    #[default]
    #[serde(rename = "IPv4")]
    Ipv4,
}

/// A rule as written in stack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    /// Port; zero or negative means any port.
    pub port: i64,
    /// Direction, ingress by default.
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Protocol, tcp by default.
    #[serde(default)]
    pub protocol: Option<Protocol>,
    /// Ethertype, IPv4 by default.
    #[serde(default)]
    pub ethertype: Option<Ethertype>,
    /// Remote CIDR, `0.0.0.0/0` by default.
    #[serde(default)]
    pub remote_prefix: Option<String>,
}

/// Validated security group rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupRuleConfig {
    name: String,
    port: Option<u16>,
    direction: Direction,
    ethertype: Ethertype,
    protocol: Protocol,
    remote_ip_prefix: String,
}

impl SecurityGroupRuleConfig {
    /// Creates a rule with default direction, protocol, ethertype and
    /// remote prefix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` if the port does not fit in a port number.
    pub fn new(name: impl Into<String>, port: Option<i64>) -> std::result::Result<Self, ResourceError> {
        let name = name.into();
        let port = normalize_port(&name, port)?;
        Ok(Self {
            name,
            port,
            direction: Direction::default(),
            ethertype: Ethertype::default(),
            protocol: Protocol::default(),
            remote_ip_prefix: DEFAULT_REMOTE_PREFIX.to_string(),
        })
    }

    /// Builds a rule from configuration, named
    /// `<prefix>-<direction>-<protocol>[-<port>]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` or `InvalidAddress` if the rule is invalid.
    pub fn from_spec(prefix: &str, spec: &RuleSpec) -> std::result::Result<Self, ResourceError> {
        let direction = spec.direction.unwrap_or_default();
        let protocol = spec.protocol.unwrap_or_default();
        let port_suffix = if spec.port > 0 {
            format!("-{}", spec.port)
        } else {
            String::new()
        };

        let mut rule = Self::new(format!("{prefix}-{direction}-{protocol}{port_suffix}"), Some(spec.port))?;
        rule.direction = direction;
        rule.protocol = protocol;
        if let Some(ethertype) = spec.ethertype {
            rule.ethertype = ethertype;
        }
        if let Some(remote) = spec.remote_prefix.as_deref().filter(|r| !r.is_empty()) {
            rule.set_remote_ip_prefix(remote)?;
        }
        Ok(rule)
    }

    /// Sets the port; zero or negative removes the restriction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` if the port does not fit in a port number.
    pub fn set_port(&mut self, port: Option<i64>) -> std::result::Result<(), ResourceError> {
        self.port = normalize_port(&self.name, port)?;
        Ok(())
    }

    /// Sets the direction.
    pub const fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Sets the protocol.
    pub const fn set_protocol(&mut self, protocol: Protocol) {
        self.protocol = protocol;
    }

    /// Sets the remote CIDR.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if the prefix is not a valid network.
    pub fn set_remote_ip_prefix(&mut self, prefix: &str) -> std::result::Result<(), ResourceError> {
        parse_network(prefix)?;
        self.remote_ip_prefix = prefix.trim().to_string();
        Ok(())
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the port, or `None` for any port.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Returns the ethertype.
    #[must_use]
    pub const fn ethertype(&self) -> Ethertype {
        self.ethertype
    }

    /// Returns the remote CIDR.
    #[must_use]
    pub fn remote_ip_prefix(&self) -> &str {
        &self.remote_ip_prefix
    }
}

fn normalize_port(name: &str, port: Option<i64>) -> std::result::Result<Option<u16>, ResourceError> {
    match port {
        None => Ok(None),
        Some(p) if p <= 0 => Ok(None),
        Some(p) => u16::try_from(p).map(Some).map_err(|_| ResourceError::InvalidRule {
            name: name.to_string(),
            message: format!("port {p} is out of range"),
        }),
    }
}

/// Validated security group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupConfig {
    name: String,
    description: String,
    delete_default_rules: bool,
    rules: Vec<SecurityGroupRuleConfig>,
}

impl SecurityGroupConfig {
    /// Creates a group described as `<name> Security Group`.
    #[must_use]
    pub fn new(name: impl Into<String>, rules: Vec<SecurityGroupRuleConfig>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name} Security Group"),
            name,
            delete_default_rules: false,
            rules,
        }
    }

    /// Overrides the description; an empty one keeps the default.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            self.description = description;
        }
        self
    }

    /// Sets whether the cloud's default rules are removed.
    #[must_use]
    pub const fn with_delete_default_rules(mut self, delete: bool) -> Self {
        self.delete_default_rules = delete;
        self
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns whether default rules are removed.
    #[must_use]
    pub const fn delete_default_rules(&self) -> bool {
        self.delete_default_rules
    }

    /// Returns the rules in order.
    #[must_use]
    pub fn rules(&self) -> &[SecurityGroupRuleConfig] {
        &self.rules
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecGroupProperties<'a> {
    name: &'a str,
    description: &'a str,
    delete_default_rules: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecGroupRuleProperties<'a> {
    security_group_id: Output<String>,
    direction: Direction,
    ethertype: Ethertype,
    protocol: Protocol,
    remote_ip_prefix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_range_min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port_range_max: Option<u16>,
}

/// A declared security group with its rules.
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    /// The group.
    pub group: ResourceHandle,
    /// The rules, in declaration order.
    pub rules: Vec<ResourceHandle>,
}

impl SecurityGroup {
    /// Declares the group and its rules.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if any name is already declared.
    pub fn declare(program: &mut Program, config: &SecurityGroupConfig) -> Result<Self> {
        let group = program.declare(
            config.name(),
            SECURITY_GROUP_TYPE,
            &SecGroupProperties {
                name: config.name(),
                description: config.description(),
                delete_default_rules: config.delete_default_rules(),
            },
        )?;

        let mut rules = Vec::with_capacity(config.rules().len());
        for rule in config.rules() {
            let handle = program.declare_with(
                rule.name(),
                SECURITY_GROUP_RULE_TYPE,
                &SecGroupRuleProperties {
                    security_group_id: group.id(),
                    direction: rule.direction(),
                    ethertype: rule.ethertype(),
                    protocol: rule.protocol(),
                    remote_ip_prefix: rule.remote_ip_prefix(),
                    port_range_min: rule.port(),
                    port_range_max: rule.port(),
                },
                ResourceOptions::delete_before_replace(),
            )?;
            rules.push(handle);
        }

        Ok(Self { group, rules })
    }
}
