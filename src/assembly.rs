//! VM assembly.
//!
//! [`VmAssembler`] turns one inventory item into an instance (and, when NAT
//! is requested, a floating IP). Per item it resolves the environment
//! defaults, looks up flavor, image and network ids, checks a fixed IP
//! against the CIDR recorded in the network unit's stack file, and declares
//! the resources. Any failure aborts the whole run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::cloud::LookupCache;
use crate::config::{Config, ConfigStore, stack_config_path};
use crate::error::{ConfigError, PlacementError, Result};
use crate::program::{Output, Program, StackReference};
use crate::resources::address::{parse_address, parse_network};
use crate::resources::{FloatingIp, FloatingIpConfig, Instance, InstanceConfig};

/// One VM of the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Host name.
    pub host: String,
    /// Network short name; the environment default when absent.
    #[serde(default)]
    pub network: Option<String>,
    /// Whether to attach a floating IP.
    #[serde(default)]
    pub nat: bool,
    /// Flavor name override.
    #[serde(default)]
    pub flavor: Option<String>,
    /// Image name override.
    #[serde(default)]
    pub image: Option<String>,
    /// Fixed IPv4 address on the network.
    #[serde(default)]
    pub fixed_ip: Option<String>,
    /// Boot volume size in GB; zero boots from the image.
    #[serde(default)]
    pub boot_volume: Option<u32>,
    /// Whether to add a second interface on the same network.
    #[serde(default)]
    pub secondary_iface: bool,
}

/// Environment-wide VM defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    /// Network short name.
    pub network: String,
    /// Image name.
    pub image: String,
    /// Flavor name.
    pub flavor: String,
}

impl Defaults {
    /// Reads `default_network`, `default_image` and `default_flavor`.
    ///
    /// # Errors
    ///
    /// Returns `MissingConfiguration` if any of them is absent.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            network: config.require_str("default_network")?,
            image: config.require_str("default_image")?,
            flavor: config.require_str("default_flavor")?,
        })
    }
}

/// Stack references an instances unit reads from.
#[derive(Debug, Clone)]
pub struct UnitReferences {
    /// Network unit (`networks`, `external_network_name`).
    pub network: StackReference,
    /// Default security group unit (`sg`).
    pub security_group: StackReference,
    /// Keypair unit (`keypair`), if any.
    pub keypair: Option<StackReference>,
}

impl UnitReferences {
    /// Name of the default security group.
    ///
    /// # Errors
    ///
    /// Returns an error if the projection fails.
    pub fn security_group_name(&self) -> Result<Output<String>> {
        self.security_group.output::<Value>("sg").get("name")
    }

    /// Id of the shared keypair, if a keypair unit is referenced.
    ///
    /// # Errors
    ///
    /// Returns an error if the projection fails.
    pub fn keypair_id(&self) -> Result<Option<Output<String>>> {
        self.keypair
            .as_ref()
            .map(|keypair| keypair.output::<Value>("keypair").get("id"))
            .transpose()
    }

    /// Name of the external network, used as the floating IP pool.
    #[must_use]
    pub fn external_network_name(&self) -> Output<String> {
        self.network.output("external_network_name")
    }
}

/// Parameters of one VM after defaults and lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    host: String,
    network: String,
    network_name: String,
    nat: bool,
    flavor_id: String,
    image_id: String,
    network_id: String,
    fixed_ip: Option<String>,
}

/// A network as recorded in the network unit's stack file.
#[derive(Debug, Clone, Deserialize)]
struct PersistedNetwork {
    name: String,
    #[serde(default)]
    cidr: Option<String>,
}

/// Resources declared for one inventory item.
#[derive(Debug, Clone)]
pub struct AssembledVm {
    /// Inventory host name.
    pub host: String,
    /// Validated instance arguments.
    pub config: InstanceConfig,
    /// The instance.
    pub instance: Instance,
    /// The floating IP, when NAT was requested.
    pub floating_ip: Option<FloatingIp>,
}

impl AssembledVm {
    /// Output entry describing the VM.
    ///
    /// # Errors
    ///
    /// Returns an error if an output projection fails.
    pub fn summary(&self) -> Result<Value> {
        let handle = &self.instance.handle;
        let nat = self
            .floating_ip
            .as_ref()
            .map_or(Value::Null, |fip| json!(fip.address()));
        let network: Output<String> = handle
            .output::<Value>("networks")
            .index::<Value>(0)?
            .get("name")?;

        Ok(json!({
            "name": handle.output::<String>("name"),
            "address": handle.output::<String>("accessIpV4"),
            "image": handle.output::<String>("imageName"),
            "nat": nat,
            "network": network,
        }))
    }
}

/// Builds VMs from inventory items.
#[derive(Debug)]
pub struct VmAssembler<'a> {
    stack: String,
    defaults: Defaults,
    references: UnitReferences,
    user_data: Option<Output<String>>,
    lookups: &'a LookupCache,
    network_config_dir: PathBuf,
    persisted: HashMap<PathBuf, Option<Vec<PersistedNetwork>>>,
}

impl<'a> VmAssembler<'a> {
    /// Creates an assembler bound to the unit's stack references.
    ///
    /// `network_config_dir` is the network unit's directory, whose
    /// `Pulumi.<stack>.yaml` records the subnet CIDRs.
    #[must_use]
    pub fn new(
        stack: impl Into<String>,
        defaults: Defaults,
        references: UnitReferences,
        lookups: &'a LookupCache,
        network_config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stack: stack.into(),
            defaults,
            references,
            user_data: None,
            lookups,
            network_config_dir: network_config_dir.into(),
            persisted: HashMap::new(),
        }
    }

    /// Sets the user data passed to every VM. User data replaces the
    /// keypair.
    pub fn set_user_data(&mut self, user_data: Output<String>) {
        self.user_data = Some(user_data);
    }

    /// Declares the resources of one inventory item.
    ///
    /// # Errors
    ///
    /// Returns lookup, placement, validation or duplicate-name errors.
    pub async fn assemble(&mut self, program: &mut Program, item: &InventoryItem) -> Result<AssembledVm> {
        let placement = self.resolve(item).await?;

        if let Some(fixed_ip) = placement.fixed_ip.as_deref() {
            self.validate_address(&placement.host, &placement.network, fixed_ip)?;
        }

        let config = self.instance_config(&placement, item)?;
        let instance = Instance::declare(program, &format!("{}-vm-{}", self.stack, placement.host), &config)?;
        info!("Declared VM {} on {}", placement.host, placement.network_name);

        let floating_ip = if placement.nat {
            let fip = FloatingIpConfig::new(
                format!("{}-fip-{}", self.stack, placement.host),
                Some(format!("{}-fip-associate-{}", self.stack, placement.host)),
                self.references.external_network_name(),
                instance.id(),
            );
            Some(FloatingIp::declare(program, &fip)?)
        } else {
            None
        };

        Ok(AssembledVm {
            host: placement.host,
            config,
            instance,
            floating_ip,
        })
    }

    async fn resolve(&self, item: &InventoryItem) -> Result<Placement> {
        let network = item.network.clone().unwrap_or_else(|| self.defaults.network.clone());
        let network_name = format!("{}-{network}", self.stack);

        let image = item.image.as_deref().unwrap_or(&self.defaults.image);
        let flavor = item.flavor.as_deref().unwrap_or(&self.defaults.flavor);

        let image_id = self.lookups.image(image).await?.id;
        let flavor_id = self.lookups.flavor(flavor).await?.id;
        let network_id = self.lookups.network(&network_name).await?.id;
        debug!(
            "Resolved {}: image {} flavor {} network {}",
            item.host, image_id, flavor_id, network_id
        );

        Ok(Placement {
            host: item.host.clone(),
            network,
            network_name,
            nat: item.nat,
            flavor_id,
            image_id,
            network_id,
            fixed_ip: item.fixed_ip.clone().filter(|ip| !ip.is_empty()),
        })
    }

    fn validate_address(&mut self, host: &str, network: &str, fixed_ip: &str) -> Result<()> {
        let path = stack_config_path(&self.network_config_dir, &self.stack);
        let Some(networks) = self.persisted_networks(&path)? else {
            warn!("IP address {} for vm {} not validated", fixed_ip, host);
            return Ok(());
        };

        let cidr = networks
            .iter()
            .find(|n| n.name == network)
            .and_then(|n| n.cidr.clone())
            .ok_or_else(|| PlacementError::NetworkNotFound {
                network: network.to_string(),
                path: path.clone(),
            })?;

        let net = parse_network(&cidr)?;
        let address = parse_address(fixed_ip)?;
        if !net.contains(&address) {
            return Err(PlacementError::AddressOutsideCidr {
                address: address.to_string(),
                host: host.to_string(),
                cidr: net.to_string(),
            }
            .into());
        }

        debug!("VM ip {} for {} is within {}", address, host, net);
        Ok(())
    }

    /// Reads the persisted networks of a stack file once per run.
    ///
    /// `None` means the file could not be loaded; a loaded file without a
    /// `networks` list yields an empty list. A JSON string is accepted in
    /// place of a list. A `networks` value that does not describe networks
    /// is a parse error.
    fn persisted_networks(&mut self, path: &Path) -> Result<Option<&Vec<PersistedNetwork>>> {
        if !self.persisted.contains_key(path) {
            let networks = match ConfigStore::load(path) {
                Ok(store) => match store.lookup_any("networks") {
                    Some(value) => Some(parse_persisted_networks(value).map_err(|message| {
                        ConfigError::ParseError {
                            message,
                            location: Some(path.display().to_string()),
                        }
                    })?),
                    None => Some(Vec::new()),
                },
                Err(e) => {
                    warn!("Network configuration {} unavailable: {}", path.display(), e);
                    None
                }
            };
            self.persisted.insert(path.to_path_buf(), networks);
        }
        Ok(self.persisted.get(path).and_then(Option::as_ref))
    }

    fn instance_config(&self, placement: &Placement, item: &InventoryItem) -> Result<InstanceConfig> {
        let mut config = InstanceConfig::new(
            placement.host.clone(),
            placement.flavor_id.clone(),
            placement.image_id.clone(),
            Output::known(placement.network_id.clone()),
        );
        config.add_security_group(self.references.security_group_name()?);

        if let Some(fixed_ip) = placement.fixed_ip.as_deref() {
            config.set_fixed_ip(fixed_ip)?;
        }
        if let Some(size) = item.boot_volume.filter(|size| *size > 0) {
            config.set_boot_volume(size)?;
        }
        config.set_secondary_iface(item.secondary_iface);

        if let Some(user_data) = &self.user_data {
            config.set_user_data(user_data.clone());
        } else if let Some(keypair_id) = self.references.keypair_id()? {
            config.set_key_pair(keypair_id);
        }

        Ok(config)
    }
}

/// Decodes a `networks` value, reading strings as JSON.
fn parse_persisted_networks(value: &serde_yaml::Value) -> std::result::Result<Vec<PersistedNetwork>, String> {
    match value {
        serde_yaml::Value::String(raw) => serde_json::from_str(raw).map_err(|e| e.to_string()),
        other => serde_yaml::from_value(other.clone()).map_err(|e| e.to_string()),
    }
}
