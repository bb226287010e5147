//! Compute instance builder.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::error::{ResourceError, Result};
use crate::program::{Output, Program, ResourceHandle, ResourceOptions};

use super::INSTANCE_TYPE;
use super::address::parse_address;

/// Instance properties whose drift is ignored after creation.
pub const IGNORED_INSTANCE_CHANGES: [&str; 2] = ["imageId", "userData"];

/// Instance arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceConfig {
    name: String,
    flavor_id: String,
    image_id: String,
    boot_volume: Option<u32>,
    key_pair: Option<Output<String>>,
    security_groups: Vec<Output<String>>,
    internal_net_id: Output<String>,
    access_network: bool,
    fixed_ip: Option<Ipv4Addr>,
    user_data: Option<Output<String>>,
    secondary_iface: bool,
}

impl InstanceConfig {
    /// Creates an image-booted instance on one network.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        flavor_id: impl Into<String>,
        image_id: impl Into<String>,
        internal_net_id: Output<String>,
    ) -> Self {
        Self {
            name: name.into(),
            flavor_id: flavor_id.into(),
            image_id: image_id.into(),
            boot_volume: None,
            key_pair: None,
            security_groups: Vec::new(),
            internal_net_id,
            access_network: true,
            fixed_ip: None,
            user_data: None,
            secondary_iface: false,
        }
    }

    /// Boots from a volume of `size` GB created from the image.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInstance` if the size is zero.
    pub fn set_boot_volume(&mut self, size: u32) -> std::result::Result<(), ResourceError> {
        if size == 0 {
            return Err(ResourceError::InvalidInstance {
                name: self.name.clone(),
                message: String::from("boot volume must not be empty"),
            });
        }
        self.boot_volume = Some(size);
        Ok(())
    }

    /// Sets the keypair.
    pub fn set_key_pair(&mut self, key_pair: Output<String>) {
        self.key_pair = Some(key_pair);
    }

    /// Adds a security group.
    pub fn add_security_group(&mut self, group: Output<String>) {
        self.security_groups.push(group);
    }

    /// Sets whether the primary interface is the access network.
    pub const fn set_access_network(&mut self, access: bool) {
        self.access_network = access;
    }

    /// Sets the fixed IPv4 address of the primary interface.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if the value is not an IPv4 address.
    pub fn set_fixed_ip(&mut self, address: &str) -> std::result::Result<(), ResourceError> {
        self.fixed_ip = Some(parse_address(address)?);
        Ok(())
    }

    /// Sets the user data payload.
    pub fn set_user_data(&mut self, user_data: Output<String>) {
        self.user_data = Some(user_data);
    }

    /// Adds a secondary interface on the same network.
    pub const fn set_secondary_iface(&mut self, enabled: bool) {
        self.secondary_iface = enabled;
    }

    /// Returns the inventory name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the keypair, if any.
    #[must_use]
    pub const fn key_pair(&self) -> Option<&Output<String>> {
        self.key_pair.as_ref()
    }

    /// Returns the user data, if any.
    #[must_use]
    pub const fn user_data(&self) -> Option<&Output<String>> {
        self.user_data.as_ref()
    }

    /// Returns the security groups.
    #[must_use]
    pub fn security_groups(&self) -> &[Output<String>] {
        &self.security_groups
    }

    /// Returns the fixed address, if any.
    #[must_use]
    pub const fn fixed_ip(&self) -> Option<Ipv4Addr> {
        self.fixed_ip
    }

    fn networks(&self) -> Vec<NetworkAttachment> {
        let mut networks = vec![NetworkAttachment {
            access_network: self.access_network,
            uuid: self.internal_net_id.clone(),
            fixed_ip_v4: self.fixed_ip.map(|ip| ip.to_string()),
        }];

        if self.secondary_iface {
            networks.push(NetworkAttachment {
                access_network: false,
                uuid: self.internal_net_id.clone(),
                fixed_ip_v4: None,
            });
        }

        networks
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkAttachment {
    access_network: bool,
    uuid: Output<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fixed_ip_v4: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockDevice<'a> {
    uuid: &'a str,
    source_type: &'static str,
    destination_type: &'static str,
    boot_index: u32,
    volume_size: u32,
    delete_on_termination: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceProperties<'a> {
    name: &'a str,
    flavor_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_devices: Option<Vec<BlockDevice<'a>>>,
    security_groups: &'a [Output<String>],
    networks: Vec<NetworkAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<&'a Output<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_pair: Option<&'a Output<String>>,
}

/// A declared compute instance.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The instance.
    pub handle: ResourceHandle,
}

impl Instance {
    /// Declares the instance under `logical_name`, which is also its
    /// cloud-side name.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the name is already declared.
    pub fn declare(program: &mut Program, logical_name: &str, config: &InstanceConfig) -> Result<Self> {
        let (image_id, block_devices) = match config.boot_volume {
            Some(size) => (
                None,
                Some(vec![BlockDevice {
                    uuid: &config.image_id,
                    source_type: "image",
                    destination_type: "volume",
                    boot_index: 0,
                    volume_size: size,
                    delete_on_termination: true,
                }]),
            ),
            None => (Some(config.image_id.as_str()), None),
        };

        let properties = InstanceProperties {
            name: logical_name,
            flavor_id: &config.flavor_id,
            image_id,
            block_devices,
            security_groups: &config.security_groups,
            networks: config.networks(),
            user_data: config.user_data.as_ref(),
            key_pair: config.key_pair.as_ref(),
        };

        let handle = program.declare_with(
            logical_name,
            INSTANCE_TYPE,
            &properties,
            ResourceOptions::ignore_changes(&IGNORED_INSTANCE_CHANGES),
        )?;

        Ok(Self { handle })
    }

    /// References the instance id.
    #[must_use]
    pub fn id(&self) -> Output<String> {
        self.handle.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> InstanceConfig {
        let mut config = InstanceConfig::new(
            "web1",
            "flavor-id",
            "image-id",
            Output::known(String::from("net-id")),
        );
        config.add_security_group(Output::known(String::from("dev-sg-default")));
        config
    }

    #[test]
    fn test_image_boot() {
        let mut program = Program::new();
        Instance::declare(&mut program, "dev-vm-web1", &config()).unwrap();

        let vm = program.resource("dev-vm-web1").unwrap();
        assert_eq!(vm.properties["name"], "dev-vm-web1");
        assert_eq!(vm.properties["imageId"], "image-id");
        assert!(vm.properties.get("blockDevices").is_none());
        assert!(vm.properties.get("keyPair").is_none());
        assert!(vm.properties.get("userData").is_none());
        assert_eq!(vm.options.ignore_changes, vec!["imageId", "userData"]);
    }

    #[test]
    fn test_volume_boot() {
        let mut cfg = config();
        cfg.set_boot_volume(20).unwrap();
        assert!(matches!(
            cfg.set_boot_volume(0),
            Err(ResourceError::InvalidInstance { .. })
        ));

        let mut program = Program::new();
        Instance::declare(&mut program, "dev-vm-web1", &cfg).unwrap();

        let vm = program.resource("dev-vm-web1").unwrap();
        assert!(vm.properties.get("imageId").is_none());
        let device = &vm.properties["blockDevices"][0];
        assert_eq!(device["uuid"], "image-id");
        assert_eq!(device["sourceType"], "image");
        assert_eq!(device["destinationType"], "volume");
        assert_eq!(device["bootIndex"], 0);
        assert_eq!(device["volumeSize"], 20);
        assert_eq!(device["deleteOnTermination"], true);
    }

    #[test]
    fn test_secondary_interface_appended() {
        let mut cfg = config();
        cfg.set_fixed_ip("10.0.0.5").unwrap();
        cfg.set_secondary_iface(true);

        let mut program = Program::new();
        Instance::declare(&mut program, "dev-vm-web1", &cfg).unwrap();

        let networks = &program.resource("dev-vm-web1").unwrap().properties["networks"];
        assert_eq!(networks.as_array().unwrap().len(), 2);
        assert_eq!(networks[0]["accessNetwork"], true);
        assert_eq!(networks[0]["fixedIpV4"], "10.0.0.5");
        assert_eq!(networks[1]["accessNetwork"], false);
        assert!(networks[1].get("fixedIpV4").is_none());
    }

    #[test]
    fn test_invalid_fixed_ip() {
        let mut cfg = config();
        assert!(cfg.set_fixed_ip("10.0.0.300").is_err());
        assert!(cfg.fixed_ip().is_none());
    }
}
