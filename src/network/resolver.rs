//! Host resolution with SSRF protection
//!
//! Every request resolves its host exactly once. The single address that comes
//! back is classified against the non-public ranges below and, if it passes,
//! is reused read-only for every probe of that request. Nothing is cached
//! across requests, so a changed DNS answer is always re-checked.

use crate::ScanError;
use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const BLOCKED_RANGES: &[&str] = &[
    // IPv4
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.88.99.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    // IPv6
    "::/128",
    "::1/128",
    "64:ff9b:1::/48",
    "100::/64",
    "2001::/23",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
    "fec0::/10",
    "ff00::/8",
];

static BLOCKED_NETWORKS: Lazy<Vec<IpNetwork>> = Lazy::new(|| {
    BLOCKED_RANGES
        .iter()
        .filter_map(|cidr| cidr.parse().ok())
        .collect()
});

/// Whether `ip` is private, loopback, link-local, multicast or otherwise reserved.
///
/// IPv4-mapped (`::ffff:a.b.c.d`) and IPv4-compatible (`::a.b.c.d`) IPv6
/// addresses are judged by the IPv4 address they carry.
pub fn is_blocked(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4() {
            Some(v4) => is_blocked_v4(v4),
            None => is_blocked_v6(v6),
        },
    }
}

fn is_blocked_v4(ip: Ipv4Addr) -> bool {
    BLOCKED_NETWORKS.iter().any(|net| match net {
        IpNetwork::V4(net) => net.contains(ip),
        IpNetwork::V6(_) => false,
    })
}

/// Anything outside global unicast (2000::/3) is reserved. Inside it, 6to4
/// (2002::/16) is judged by the IPv4 address it tunnels to.
fn is_blocked_v6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    if segments[0] & 0xe000 != 0x2000 {
        return true;
    }
    if segments[0] == 0x2002 {
        let [a, b] = segments[1].to_be_bytes();
        let [c, d] = segments[2].to_be_bytes();
        if is_blocked_v4(Ipv4Addr::new(a, b, c, d)) {
            return true;
        }
    }

    BLOCKED_NETWORKS.iter().any(|net| match net {
        IpNetwork::V6(net) => net.contains(ip),
        IpNetwork::V4(_) => false,
    })
}

/// Parse `host` as an IP literal, accepting bracketed IPv6 (`[2001:db8::1]`)
fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse().ok()
}

/// Resolves a host string to one public address
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressResolver;

impl AddressResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `host` and reject anything that is not publicly routable.
    ///
    /// Fails with [`ScanError::ResolutionError`] when the name does not
    /// resolve and [`ScanError::SsrfBlockedError`] when it resolves to a
    /// blocked address.
    pub async fn resolve(&self, host: &str) -> crate::Result<IpAddr> {
        let ip = match parse_ip_literal(host) {
            Some(ip) => ip,
            None => self.lookup(host).await?,
        };

        if is_blocked(ip) {
            log::warn!("Blocked scan of {} ({}): non-public address", host, ip);
            return Err(ScanError::SsrfBlockedError(ip));
        }

        log::info!("Resolved {} to {}", host, ip);
        Ok(ip)
    }

    async fn lookup(&self, host: &str) -> crate::Result<IpAddr> {
        let mut addrs = tokio::net::lookup_host((host, 0)).await.map_err(|e| {
            log::debug!("lookup of {} failed: {}", host, e);
            ScanError::ResolutionError(host.to_string())
        })?;

        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| ScanError::ResolutionError(host.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_every_range_parses() {
        assert_eq!(BLOCKED_NETWORKS.len(), BLOCKED_RANGES.len());
    }

    #[test]
    fn test_private_and_reserved_v4_blocked() {
        for addr in [
            "127.0.0.1",
            "10.0.0.5",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "0.0.0.0",
            "224.0.0.1",
            "255.255.255.255",
            "198.51.100.7",
        ] {
            assert!(is_blocked(ip(addr)), "{} should be blocked", addr);
        }
    }

    #[test]
    fn test_public_v4_allowed() {
        for addr in ["1.1.1.1", "8.8.8.8", "93.184.216.34", "172.32.0.1", "100.128.0.1"] {
            assert!(!is_blocked(ip(addr)), "{} should be allowed", addr);
        }
    }

    #[test]
    fn test_v6_ranges() {
        assert!(is_blocked(ip("::1")));
        assert!(is_blocked(ip("::")));
        assert!(is_blocked(ip("fe80::1")));
        assert!(is_blocked(ip("fd12:3456::1")));
        assert!(is_blocked(ip("2001:db8::1")));
        assert!(is_blocked(ip("ff02::1")));
        assert!(!is_blocked(ip("2606:4700:4700::1111")));
    }

    #[test]
    fn test_v6_outside_global_unicast_blocked() {
        for addr in ["4000::1", "101::1", "e000::1", "fe00::1", "64:ff9b::a00:1", "8000::"] {
            assert!(is_blocked(ip(addr)), "{} should be blocked", addr);
        }
        assert!(!is_blocked(ip("2a00:1450:4001::1")));
    }

    #[test]
    fn test_6to4_judged_by_tunnelled_v4() {
        assert!(is_blocked(ip("2002:a00:1::1")));
        assert!(is_blocked(ip("2002:7f00:1::")));
        assert!(!is_blocked(ip("2002:808:808::1")));
    }

    #[tokio::test]
    async fn test_reserved_v6_literal_is_ssrf_blocked() {
        let err = AddressResolver::new().resolve("4000::1").await.unwrap_err();
        assert!(matches!(err, ScanError::SsrfBlockedError(_)));
    }

    #[test]
    fn test_embedded_v4_is_unwrapped() {
        assert!(is_blocked(ip("::ffff:127.0.0.1")));
        assert!(is_blocked(ip("::ffff:10.1.2.3")));
        assert!(!is_blocked(ip("::ffff:1.1.1.1")));
    }

    #[test]
    fn test_bracketed_literal() {
        assert_eq!(parse_ip_literal("[2606:4700::1]"), Some(ip("2606:4700::1")));
        assert_eq!(parse_ip_literal("1.1.1.1"), Some(ip("1.1.1.1")));
        assert_eq!(parse_ip_literal("example.com"), None);
    }

    #[tokio::test]
    async fn test_loopback_literal_is_ssrf_blocked() {
        let err = AddressResolver::new().resolve("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ScanError::SsrfBlockedError(addr) if addr == ip("127.0.0.1")));
    }

    #[tokio::test]
    async fn test_public_literal_resolves_without_dns() {
        let resolved = AddressResolver::new().resolve("1.1.1.1").await.unwrap();
        assert_eq!(resolved, ip("1.1.1.1"));
    }

    #[tokio::test]
    async fn test_localhost_name_is_blocked_not_unresolved() {
        match AddressResolver::new().resolve("localhost").await {
            Err(ScanError::SsrfBlockedError(addr)) => assert!(addr.is_loopback()),
            other => panic!("expected SSRF block, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_tld_is_resolution_error() {
        let err = AddressResolver::new()
            .resolve("this-host-does-not-exist.invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ResolutionError(ref h) if h == "this-host-does-not-exist.invalid"));
    }

    proptest! {
        #[test]
        fn prop_private_literals_always_blocked(b in any::<u8>(), c in any::<u8>(), d in any::<u8>()) {
            for host in [format!("10.{}.{}.{}", b, c, d), format!("192.168.{}.{}", c, d)] {
                let outcome = tokio_test::block_on(AddressResolver::new().resolve(&host));
                prop_assert!(matches!(outcome, Err(ScanError::SsrfBlockedError(_))));
            }
        }
    }
}
