//! Resource builders.
//!
//! Each builder validates its arguments eagerly and declares the matching
//! OpenStack resources into a [`Program`](crate::program::Program).

pub mod address;
mod floating_ip;
mod instance;
mod keypair;
mod network;
mod security_group;

pub use floating_ip::{FloatingIp, FloatingIpConfig};
pub use instance::{IGNORED_INSTANCE_CHANGES, Instance, InstanceConfig};
pub use keypair::{KeypairConfig, declare_keypair};
pub use network::{DhcpPool, NetworkArgs, NetworkConfig, SUBNET_PREFIX_LEN, Vpc};
pub use security_group::{
    DEFAULT_REMOTE_PREFIX, Direction, Ethertype, Protocol, RuleSpec, SecurityGroup,
    SecurityGroupConfig, SecurityGroupRuleConfig,
};

/// Network type token.
pub const NETWORK_TYPE: &str = "openstack:networking:Network";
/// Subnet type token.
pub const SUBNET_TYPE: &str = "openstack:networking:Subnet";
/// Router interface type token.
pub const ROUTER_INTERFACE_TYPE: &str = "openstack:networking:RouterInterface";
/// Security group type token.
pub const SECURITY_GROUP_TYPE: &str = "openstack:networking:SecGroup";
/// Security group rule type token.
pub const SECURITY_GROUP_RULE_TYPE: &str = "openstack:networking:SecGroupRule";
/// Floating IP type token.
pub const FLOATING_IP_TYPE: &str = "openstack:networking:FloatingIp";
/// Compute instance type token.
pub const INSTANCE_TYPE: &str = "openstack:compute:Instance";
/// Floating IP association type token.
pub const FLOATING_IP_ASSOCIATE_TYPE: &str = "openstack:compute:FloatingIpAssociate";
/// Keypair type token.
pub const KEYPAIR_TYPE: &str = "openstack:compute:Keypair";
