//! Network unit: networks, subnets and router interfaces.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::cloud::LookupCache;
use crate::config::Config;
use crate::error::Result;
use crate::program::{Output, Program};
use crate::resources::{NetworkArgs, NetworkConfig, Vpc};

/// A network as written in stack configuration.
#[derive(Debug, Clone, Deserialize)]
struct NetworkEntry {
    name: String,
    cidr: String,
    #[serde(default)]
    network_admin_state_up: Option<bool>,
    #[serde(default)]
    dns: Option<Vec<String>>,
    #[serde(default)]
    dhcp: Option<bool>,
    #[serde(default)]
    dhcp_pool: Option<Vec<String>>,
    #[serde(default)]
    router: Option<String>,
}

/// Builds the network program.
///
/// # Errors
///
/// Returns configuration, lookup or validation errors.
pub async fn build(config: &Config, lookups: &LookupCache) -> Result<Program> {
    let stack = config.parse_stack().env_suffix;

    let networks: Vec<NetworkEntry> = config.require_object("networks")?;
    let external_network = lookups.network(&config.require_str("external_network")?).await?;
    let default_router = lookups.router(&config.require_str("default_router")?).await?;
    let default_dns = config.get_list("default_dns").unwrap_or_else(|e| {
        warn!("Ignoring default_dns: {}", e);
        Vec::new()
    });

    let mut program = Program::new();
    let mut outputs = Vec::with_capacity(networks.len());

    for net in &networks {
        let network_name = format!("{stack}-{}", net.name);
        let router = match net.router.as_deref() {
            Some(name) => lookups.router(name).await?,
            None => default_router.clone(),
        };

        let mut args = NetworkArgs::new(network_name.clone(), net.cidr.clone(), router.name.clone());
        args.subnet_name = Some(format!("{network_name}-subnet"));
        args.subnet_dns = Some(net.dns.clone().unwrap_or_else(|| default_dns.clone()));
        if let Some(up) = net.network_admin_state_up {
            args.network_admin_state_up = up;
        }
        if let Some(dhcp) = net.dhcp {
            args.subnet_dhcp = dhcp;
        }
        args.subnet_dhcp_pool = net.dhcp_pool.clone().filter(|pool| !pool.is_empty());

        let network_config = NetworkConfig::new(args)?;
        let vpc = Vpc::declare(&mut program, &network_config, Output::known(router.id.clone()))?;
        info!("Declared network {} ({})", network_name, network_config.cidr());

        let subnet = &vpc.subnet;
        let dhcp_pool: Output<Value> = subnet.output::<Value>("allocationPools").index(0)?;
        outputs.push(json!({
            "network_id": vpc.network.id(),
            "admin_state_up": vpc.network.output::<bool>("adminStateUp"),
            "name": vpc.network.output::<String>("name"),
            "subnet": {
                "name": subnet.output::<String>("name"),
                "id": subnet.id(),
                "cidr": subnet.output::<String>("cidr"),
                "dns": subnet.output::<Vec<String>>("dnsNameservers"),
                "dhcp": subnet.output::<bool>("enableDhcp"),
                "dhcp_pool": dhcp_pool,
            },
        }));
    }

    program.export("networks", &outputs)?;
    program.export("external_network_name", &external_network.name)?;
    Ok(program)
}
