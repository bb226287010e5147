//! Network, subnet and router interface builders.
//!
//! [`NetworkConfig`] validates its arguments on construction and on every
//! mutation: the subnet must be a /24, DNS lists need at least two valid
//! servers, and the DHCP pool must lie inside the subnet. Without an
//! explicit pool, DHCP hands out the 11th through 100th usable hosts.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, Result};
use crate::program::{Output, Program, ResourceHandle, ResourceOptions};

use super::address::{nth_host, parse_address, parse_network};
use super::{NETWORK_TYPE, ROUTER_INTERFACE_TYPE, SUBNET_TYPE};

/// Required subnet prefix length.
pub const SUBNET_PREFIX_LEN: u8 = 24;

/// Index of the first host of the derived DHCP pool.
const DHCP_POOL_START_HOST: usize = 10;

/// Index of the last host of the derived DHCP pool.
const DHCP_POOL_END_HOST: usize = 99;

/// Raw network arguments, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkArgs {
    /// Network name.
    pub network_name: String,
    /// Administrative state of the network.
    pub network_admin_state_up: bool,
    /// Subnet name; defaults to `<network>-subnet`.
    pub subnet_name: Option<String>,
    /// Subnet CIDR.
    pub subnet_cidr: String,
    /// DNS servers.
    pub subnet_dns: Option<Vec<String>>,
    /// Whether DHCP is enabled.
    pub subnet_dhcp: bool,
    /// Explicit DHCP pool `[start, end]`.
    pub subnet_dhcp_pool: Option<Vec<String>>,
    /// Router the subnet is attached to.
    pub router_name: String,
}

impl NetworkArgs {
    /// Creates arguments with defaults for every optional field.
    #[must_use]
    pub fn new(
        network_name: impl Into<String>,
        subnet_cidr: impl Into<String>,
        router_name: impl Into<String>,
    ) -> Self {
        Self {
            network_name: network_name.into(),
            network_admin_state_up: true,
            subnet_name: None,
            subnet_cidr: subnet_cidr.into(),
            subnet_dns: None,
            subnet_dhcp: true,
            subnet_dhcp_pool: None,
            router_name: router_name.into(),
        }
    }
}

/// A DHCP allocation pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpPool {
    /// First address handed out.
    pub start: Ipv4Addr,
    /// Last address handed out.
    pub end: Ipv4Addr,
}

/// Validated network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    args: NetworkArgs,
    subnet_name: String,
    cidr: Ipv4Net,
    dns: Vec<Ipv4Addr>,
    dhcp_pool: Option<DhcpPool>,
}

impl NetworkConfig {
    /// Validates the arguments.
    ///
    /// # Errors
    ///
    /// Returns `InvalidNetworkConfig` if any argument is invalid.
    pub fn new(args: NetworkArgs) -> std::result::Result<Self, ResourceError> {
        let cidr = parse_network(&args.subnet_cidr).map_err(as_network_error)?;
        if cidr.prefix_len() != SUBNET_PREFIX_LEN {
            return Err(ResourceError::network(format!(
                "Subnet cidr prefix must be /{SUBNET_PREFIX_LEN}, got {cidr}"
            )));
        }

        let dns = match args.subnet_dns.as_deref() {
            None | Some([]) => Vec::new(),
            Some(servers) if servers.len() < 2 => {
                return Err(ResourceError::network("Provide at least 2 DNS addresses"));
            }
            Some(servers) => servers
                .iter()
                .map(|s| parse_address(s).map_err(as_network_error))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        let dhcp_pool = if args.subnet_dhcp {
            Some(match args.subnet_dhcp_pool.as_deref() {
                None | Some([]) => derive_pool(&cidr)?,
                Some(pool) => explicit_pool(&cidr, pool)?,
            })
        } else {
            None
        };

        let subnet_name = args
            .subnet_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}-subnet", args.network_name));

        Ok(Self {
            args,
            subnet_name,
            cidr,
            dns,
            dhcp_pool,
        })
    }

    /// Applies a change to the arguments and revalidates.
    ///
    /// On failure the configuration is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the changed arguments.
    pub fn update(
        &mut self,
        change: impl FnOnce(&mut NetworkArgs),
    ) -> std::result::Result<(), ResourceError> {
        let mut args = self.args.clone();
        change(&mut args);
        *self = Self::new(args)?;
        Ok(())
    }

    /// Sets the administrative state.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the changed arguments.
    pub fn set_admin_state_up(&mut self, up: bool) -> std::result::Result<(), ResourceError> {
        self.update(|args| args.network_admin_state_up = up)
    }

    /// Enables or disables DHCP.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the changed arguments.
    pub fn set_dhcp(&mut self, enabled: bool) -> std::result::Result<(), ResourceError> {
        self.update(|args| args.subnet_dhcp = enabled)
    }

    /// Sets an explicit DHCP pool.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the changed arguments.
    pub fn set_dhcp_pool(&mut self, pool: Vec<String>) -> std::result::Result<(), ResourceError> {
        self.update(|args| args.subnet_dhcp_pool = Some(pool))
    }

    /// Sets the DNS servers.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the changed arguments.
    pub fn set_dns(&mut self, servers: Vec<String>) -> std::result::Result<(), ResourceError> {
        self.update(|args| args.subnet_dns = Some(servers))
    }

    /// Sets the subnet CIDR.
    ///
    /// # Errors
    ///
    /// Returns the validation error of the changed arguments.
    pub fn set_cidr(&mut self, cidr: impl Into<String>) -> std::result::Result<(), ResourceError> {
        let cidr = cidr.into();
        self.update(|args| args.subnet_cidr = cidr)
    }

    /// Returns the network name.
    #[must_use]
    pub fn network_name(&self) -> &str {
        &self.args.network_name
    }

    /// Returns the administrative state.
    #[must_use]
    pub const fn admin_state_up(&self) -> bool {
        self.args.network_admin_state_up
    }

    /// Returns the subnet name.
    #[must_use]
    pub fn subnet_name(&self) -> &str {
        &self.subnet_name
    }

    /// Returns the subnet CIDR.
    #[must_use]
    pub const fn cidr(&self) -> Ipv4Net {
        self.cidr
    }

    /// Returns the DNS servers; empty when none are configured.
    #[must_use]
    pub fn dns(&self) -> &[Ipv4Addr] {
        &self.dns
    }

    /// Returns whether DHCP is enabled.
    #[must_use]
    pub const fn dhcp_enabled(&self) -> bool {
        self.args.subnet_dhcp
    }

    /// Returns the DHCP pool when DHCP is enabled.
    #[must_use]
    pub const fn dhcp_pool(&self) -> Option<DhcpPool> {
        self.dhcp_pool
    }

    /// Returns the router name.
    #[must_use]
    pub fn router_name(&self) -> &str {
        &self.args.router_name
    }
}

/// Reports unparseable addresses as network configuration errors.
fn as_network_error(err: ResourceError) -> ResourceError {
    match err {
        ResourceError::InvalidAddress { value } => {
            ResourceError::network(format!("Wrong IP address provided: {value}"))
        }
        other => other,
    }
}

fn derive_pool(cidr: &Ipv4Net) -> std::result::Result<DhcpPool, ResourceError> {
    match (
        nth_host(cidr, DHCP_POOL_START_HOST),
        nth_host(cidr, DHCP_POOL_END_HOST),
    ) {
        (Some(start), Some(end)) => Ok(DhcpPool { start, end }),
        _ => Err(ResourceError::network(format!(
            "Subnet {cidr} is too small for a DHCP pool"
        ))),
    }
}

fn explicit_pool(cidr: &Ipv4Net, pool: &[String]) -> std::result::Result<DhcpPool, ResourceError> {
    let [start, end] = pool else {
        return Err(ResourceError::network(format!(
            "DHCP pool must have exactly 2 addresses, got {}",
            pool.len()
        )));
    };

    let start = parse_address(start).map_err(as_network_error)?;
    let end = parse_address(end).map_err(as_network_error)?;

    if start > end {
        return Err(ResourceError::network(format!(
            "DHCP start {start} must be lower than end {end}"
        )));
    }

    for addr in [start, end] {
        if !cidr.contains(&addr) {
            return Err(ResourceError::network(format!(
                "DHCP address {addr} must be within network cidr {cidr}"
            )));
        }
    }

    Ok(DhcpPool { start, end })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkProperties<'a> {
    name: &'a str,
    admin_state_up: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubnetProperties<'a> {
    name: &'a str,
    network_id: Output<String>,
    cidr: String,
    enable_dhcp: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dns_nameservers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allocation_pools: Option<Vec<DhcpPool>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouterInterfaceProperties {
    router_id: Output<String>,
    subnet_id: Output<String>,
}

/// A declared network with its subnet and router interface.
#[derive(Debug, Clone)]
pub struct Vpc {
    /// The network.
    pub network: ResourceHandle,
    /// The subnet.
    pub subnet: ResourceHandle,
    /// The router interface attaching the subnet.
    pub router_interface: ResourceHandle,
}

impl Vpc {
    /// Declares the network, subnet and router interface.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if any of the names is already declared.
    pub fn declare(program: &mut Program, config: &NetworkConfig, router_id: Output<String>) -> Result<Self> {
        let network = program.declare(
            config.network_name(),
            NETWORK_TYPE,
            &NetworkProperties {
                name: config.network_name(),
                admin_state_up: config.admin_state_up(),
            },
        )?;

        let dns = (!config.dns().is_empty())
            .then(|| config.dns().iter().map(ToString::to_string).collect());

        let subnet = program.declare(
            config.subnet_name(),
            SUBNET_TYPE,
            &SubnetProperties {
                name: config.subnet_name(),
                network_id: network.id(),
                cidr: config.cidr().to_string(),
                enable_dhcp: config.dhcp_enabled(),
                dns_nameservers: dns,
                allocation_pools: config.dhcp_pool().map(|pool| vec![pool]),
            },
        )?;

        let router_interface = program.declare_with(
            &format!("{}-router-iface", config.network_name()),
            ROUTER_INTERFACE_TYPE,
            &RouterInterfaceProperties {
                router_id,
                subnet_id: subnet.id(),
            },
            ResourceOptions::delete_before_replace(),
        )?;

        Ok(Self {
            network,
            subnet,
            router_interface,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cidr: &str) -> NetworkArgs {
        NetworkArgs::new("dev-net1", cidr, "router1")
    }

    #[test]
    fn test_prefix_must_be_24() {
        let result = NetworkConfig::new(args("10.0.0.0/16"));
        assert!(matches!(result, Err(ResourceError::InvalidNetworkConfig { .. })));

        let result = NetworkConfig::new(args("10.0.0.0/25"));
        assert!(matches!(result, Err(ResourceError::InvalidNetworkConfig { .. })));
    }

    #[test]
    fn test_derived_dhcp_pool() {
        let config = NetworkConfig::new(args("10.0.0.0/24")).unwrap();
        let pool = config.dhcp_pool().unwrap();
        assert_eq!(pool.start, Ipv4Addr::new(10, 0, 0, 11));
        assert_eq!(pool.end, Ipv4Addr::new(10, 0, 0, 100));
        assert_eq!(config.subnet_name(), "dev-net1-subnet");
    }

    #[test]
    fn test_explicit_pool_validation() {
        let mut outside = args("10.0.0.0/24");
        outside.subnet_dhcp_pool = Some(vec![String::from("10.0.1.10"), String::from("10.0.1.20")]);
        assert!(NetworkConfig::new(outside).is_err());

        let mut reversed = args("10.0.0.0/24");
        reversed.subnet_dhcp_pool = Some(vec![String::from("10.0.0.50"), String::from("10.0.0.20")]);
        assert!(NetworkConfig::new(reversed).is_err());

        let mut single = args("10.0.0.0/24");
        single.subnet_dhcp_pool = Some(vec![String::from("10.0.0.50")]);
        assert!(NetworkConfig::new(single).is_err());

        let mut valid = args("10.0.0.0/24");
        valid.subnet_dhcp_pool = Some(vec![String::from("10.0.0.20"), String::from("10.0.0.50")]);
        let config = NetworkConfig::new(valid).unwrap();
        assert_eq!(config.dhcp_pool().unwrap().start, Ipv4Addr::new(10, 0, 0, 20));
    }

    #[test]
    fn test_unparseable_pool_is_network_error() {
        let mut bogus = args("10.0.0.0/24");
        bogus.subnet_dhcp_pool = Some(vec![String::from("10.0.0.20"), String::from("bogus")]);
        match NetworkConfig::new(bogus) {
            Err(ResourceError::InvalidNetworkConfig { message }) => assert!(message.contains("bogus")),
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            NetworkConfig::new(args("10.0.0.300/24")),
            Err(ResourceError::InvalidNetworkConfig { .. })
        ));
    }

    #[test]
    fn test_pool_ignored_when_dhcp_disabled() {
        let mut disabled = args("10.0.0.0/24");
        disabled.subnet_dhcp = false;
        disabled.subnet_dhcp_pool = Some(vec![String::from("10.0.1.10"), String::from("10.0.1.20")]);

        let config = NetworkConfig::new(disabled).unwrap();
        assert!(config.dhcp_pool().is_none());
    }

    #[test]
    fn test_dns_validation() {
        let mut one = args("10.0.0.0/24");
        one.subnet_dns = Some(vec![String::from("8.8.8.8")]);
        assert!(matches!(
            NetworkConfig::new(one),
            Err(ResourceError::InvalidNetworkConfig { .. })
        ));

        let mut bad = args("10.0.0.0/24");
        bad.subnet_dns = Some(vec![String::from("8.8.8.8"), String::from("dns.local")]);
        match NetworkConfig::new(bad) {
            Err(ResourceError::InvalidNetworkConfig { message }) => assert!(message.contains("dns.local")),
            other => panic!("unexpected result: {other:?}"),
        }

        let mut empty = args("10.0.0.0/24");
        empty.subnet_dns = Some(Vec::new());
        assert!(NetworkConfig::new(empty).unwrap().dns().is_empty());
    }

    #[test]
    fn test_mutation_revalidates() {
        let mut config = NetworkConfig::new(args("10.0.0.0/24")).unwrap();

        assert!(config.set_cidr("10.0.0.0/23").is_err());
        assert_eq!(config.cidr().to_string(), "10.0.0.0/24");

        assert!(config.set_dhcp_pool(vec![String::from("10.0.0.200"), String::from("10.0.0.100")]).is_err());

        config.set_cidr("192.168.5.0/24").unwrap();
        assert_eq!(config.dhcp_pool().unwrap().start, Ipv4Addr::new(192, 168, 5, 11));

        config.set_dhcp(false).unwrap();
        assert!(config.dhcp_pool().is_none());
    }

    #[test]
    fn test_declare_vpc() {
        let mut program = Program::new();
        let mut network_args = args("10.0.0.0/24");
        network_args.subnet_dns = Some(vec![String::from("8.8.8.8"), String::from("1.1.1.1")]);
        let config = NetworkConfig::new(network_args).unwrap();

        let vpc = Vpc::declare(&mut program, &config, Output::known(String::from("router-id"))).unwrap();
        assert_eq!(vpc.router_interface.name(), "dev-net1-router-iface");

        let subnet = program.resource("dev-net1-subnet").unwrap();
        assert_eq!(subnet.properties["networkId"], "${dev-net1.id}");
        assert_eq!(subnet.properties["cidr"], "10.0.0.0/24");
        assert_eq!(subnet.properties["allocationPools"][0]["start"], "10.0.0.11");
        assert_eq!(subnet.properties["dnsNameservers"][1], "1.1.1.1");

        let iface = program.resource("dev-net1-router-iface").unwrap();
        assert!(iface.options.delete_before_replace);
        assert_eq!(iface.properties["routerId"], "router-id");
    }
}
