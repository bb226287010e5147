//! Floating IP builder.

use serde::Serialize;

use crate::error::Result;
use crate::program::{Output, Program, ResourceHandle};

use super::{FLOATING_IP_ASSOCIATE_TYPE, FLOATING_IP_TYPE};

/// Floating IP arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatingIpConfig {
    fip_name: String,
    fip_associate_name: String,
    pool: Output<String>,
    instance_id: Output<String>,
}

impl FloatingIpConfig {
    /// Creates the configuration. The association is named
    /// `<fip_name>-associate` unless a name is given.
    #[must_use]
    pub fn new(
        fip_name: impl Into<String>,
        fip_associate_name: Option<String>,
        pool: Output<String>,
        instance_id: Output<String>,
    ) -> Self {
        let fip_name = fip_name.into();
        let fip_associate_name = fip_associate_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{fip_name}-associate"));
        Self {
            fip_name,
            fip_associate_name,
            pool,
            instance_id,
        }
    }

    /// Returns the floating IP name.
    #[must_use]
    pub fn fip_name(&self) -> &str {
        &self.fip_name
    }

    /// Returns the association name.
    #[must_use]
    pub fn fip_associate_name(&self) -> &str {
        &self.fip_associate_name
    }
}

#[derive(Debug, Serialize)]
struct FloatingIpProperties<'a> {
    pool: &'a Output<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FloatingIpAssociateProperties<'a> {
    floating_ip: Output<String>,
    instance_id: &'a Output<String>,
}

/// A declared floating IP and its association.
#[derive(Debug, Clone)]
pub struct FloatingIp {
    /// The floating IP.
    pub fip: ResourceHandle,
    /// The association to the instance.
    pub association: ResourceHandle,
}

impl FloatingIp {
    /// Allocates a floating IP from the pool and associates it.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if either name is already declared.
    pub fn declare(program: &mut Program, config: &FloatingIpConfig) -> Result<Self> {
        let fip = program.declare(
            config.fip_name(),
            FLOATING_IP_TYPE,
            &FloatingIpProperties { pool: &config.pool },
        )?;

        let association = program.declare(
            config.fip_associate_name(),
            FLOATING_IP_ASSOCIATE_TYPE,
            &FloatingIpAssociateProperties {
                floating_ip: fip.output("address"),
                instance_id: &config.instance_id,
            },
        )?;

        Ok(Self { fip, association })
    }

    /// References the allocated address.
    #[must_use]
    pub fn address(&self) -> Output<String> {
        self.fip.output("address")
    }
}
