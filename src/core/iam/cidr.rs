//! CIDR containment for `IpAddress` conditions

use ipnetwork::IpNetwork;
use std::net::IpAddr;

/// IPv4/IPv6 range matcher
pub struct CidrMatcher;

impl CidrMatcher {
    /// Check if `ip` falls inside `cidr`
    ///
    /// Unparseable input on either side is a non-match, never an error.
    /// A bare address without a prefix length is treated as a host route.
    pub fn contains(cidr: &str, ip: &str) -> bool {
        let network = match cidr.trim().parse::<IpNetwork>() {
            Ok(network) => network,
            Err(_) => return false,
        };
        let addr = match ip.trim().parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => return false,
        };
        network.contains(addr)
    }

    /// True if any range in the list contains `ip`
    pub fn contains_any<S: AsRef<str>>(cidrs: &[S], ip: &str) -> bool {
        cidrs.iter().any(|cidr| Self::contains(cidr.as_ref(), ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_ranges() {
        assert!(CidrMatcher::contains("10.0.0.0/8", "10.1.2.3"));
        assert!(!CidrMatcher::contains("10.0.0.0/8", "192.168.1.1"));
        assert!(CidrMatcher::contains("192.168.1.0/24", "192.168.1.255"));
        assert!(!CidrMatcher::contains("192.168.1.0/24", "192.168.2.1"));
        assert!(CidrMatcher::contains("0.0.0.0/0", "8.8.8.8"));
    }

    #[test]
    fn test_ipv6_ranges() {
        assert!(CidrMatcher::contains("2001:db8::/32", "2001:db8::1"));
        assert!(!CidrMatcher::contains("2001:db8::/32", "2001:db9::1"));
        assert!(!CidrMatcher::contains("2001:db8::/32", "10.1.2.3"));
    }

    #[test]
    fn test_host_address() {
        assert!(CidrMatcher::contains("10.1.2.3", "10.1.2.3"));
        assert!(!CidrMatcher::contains("10.1.2.3", "10.1.2.4"));
    }

    #[test]
    fn test_malformed_input_denies() {
        assert!(!CidrMatcher::contains("not-a-cidr", "10.1.2.3"));
        assert!(!CidrMatcher::contains("10.0.0.0/99", "10.1.2.3"));
        assert!(!CidrMatcher::contains("10.0.0.0/8", "not-an-ip"));
        assert!(!CidrMatcher::contains("", ""));
    }

    #[test]
    fn test_contains_any() {
        let ranges = ["172.16.0.0/12", "10.0.0.0/8"];
        assert!(CidrMatcher::contains_any(&ranges, "10.9.9.9"));
        assert!(!CidrMatcher::contains_any(&ranges, "192.168.0.1"));
    }
}
