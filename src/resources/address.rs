//! IPv4 address and network parsing.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::error;

use crate::error::ResourceError;

/// Parses an IPv4 network in CIDR notation.
///
/// A bare address is treated as a /32. Host bits must be zero.
///
/// # Errors
///
/// Returns `InvalidAddress` if the value is not a valid IPv4 network.
pub fn parse_network(value: &str) -> Result<Ipv4Net, ResourceError> {
    let trimmed = value.trim();
    let parsed = if trimmed.contains('/') {
        trimmed.parse::<Ipv4Net>().ok()
    } else {
        trimmed
            .parse::<Ipv4Addr>()
            .ok()
            .and_then(|addr| Ipv4Net::new(addr, 32).ok())
    };

    match parsed {
        Some(net) if net.trunc() == net => Ok(net),
        _ => {
            error!("Wrong IP address provided: {}", value);
            Err(ResourceError::InvalidAddress {
                value: value.to_string(),
            })
        }
    }
}

/// Parses an IPv4 address.
///
/// # Errors
///
/// Returns `InvalidAddress` if the value is not a valid IPv4 address.
pub fn parse_address(value: &str) -> Result<Ipv4Addr, ResourceError> {
    value.trim().parse::<Ipv4Addr>().map_err(|_| {
        error!("Wrong IP address provided: {}", value);
        ResourceError::InvalidAddress {
            value: value.to_string(),
        }
    })
}

/// Returns the usable host at `index` (host 0 is the first address after
/// the network address).
#[must_use]
pub fn nth_host(net: &Ipv4Net, index: usize) -> Option<Ipv4Addr> {
    net.hosts().nth(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network() {
        let net = parse_network("10.0.0.0/24").unwrap();
        assert_eq!(net.prefix_len(), 24);

        let single = parse_network("10.0.0.7").unwrap();
        assert_eq!(single.prefix_len(), 32);

        assert!(parse_network("10.0.0.5/24").is_err());
        assert!(parse_network("10.0.0.0/33").is_err());
        assert!(parse_network("not-a-network").is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("8.8.8.8").unwrap(), Ipv4Addr::new(8, 8, 8, 8));

        let err = parse_address("8.8.8").unwrap_err();
        assert_eq!(err.to_string(), "Wrong IP address provided: 8.8.8");
    }

    #[test]
    fn test_nth_host() {
        let net = parse_network("10.0.0.0/24").unwrap();
        assert_eq!(nth_host(&net, 0), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(nth_host(&net, 10), Some(Ipv4Addr::new(10, 0, 0, 11)));
        assert_eq!(nth_host(&net, 99), Some(Ipv4Addr::new(10, 0, 0, 100)));
        assert_eq!(nth_host(&net, 254), None);
    }
}
