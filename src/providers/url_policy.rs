//! Checks applied to the upstream URL before any request is sent.

use reqwest::Url;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

use crate::core::FetchError;

const SAFE_PORTS: [u16; 3] = [80, 443, 8080];

#[derive(Debug, Clone, Copy, Default)]
pub struct UrlPolicy {
    allow_private_hosts: bool,
}

impl UrlPolicy {
    /// Public hosts on standard ports only.
    pub fn strict() -> Self {
        Self {
            allow_private_hosts: false,
        }
    }

    /// Any host and port. For trusted networks and tests.
    pub fn permissive() -> Self {
        Self {
            allow_private_hosts: true,
        }
    }

    /// Validates `url`. For a domain host under the strict policy, returns the
    /// vetted address so the request can be pinned to it.
    pub async fn check(&self, url: &Url) -> Result<Option<(String, SocketAddr)>, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsafeUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(FetchError::UnsafeUrl("credentials in URL".to_string()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::UnsafeUrl("missing host".to_string()))?;

        if self.allow_private_hosts {
            return Ok(None);
        }

        let port = url
            .port_or_known_default()
            .ok_or_else(|| FetchError::UnsafeUrl("missing port".to_string()))?;
        if !SAFE_PORTS.contains(&port) {
            return Err(FetchError::UnsafeUrl(format!("port {port} not allowed")));
        }

        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return if is_public(ip) {
                Ok(None)
            } else {
                Err(FetchError::UnsafeUrl(format!("non-public address {ip}")))
            };
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| FetchError::Network(format!("DNS lookup failed for {host}: {e}")))?
            .collect();
        let first = *addrs
            .first()
            .ok_or_else(|| FetchError::Network(format!("No addresses for {host}")))?;
        if let Some(private) = addrs.iter().find(|addr| !is_public(addr.ip())) {
            return Err(FetchError::UnsafeUrl(format!(
                "{host} resolves to non-public address {}",
                private.ip()
            )));
        }

        debug!(host, %first, "Upstream host vetted");
        Ok(Some((host.to_string(), first)))
    }
}

pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match embedded_v4(v6) {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

/// The IPv4 address carried by a mapped, compatible or NAT64 (64:ff9b::/96) address.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return Some(v4);
    }
    let s = ip.segments();
    let compatible = s[..6].iter().all(|&seg| seg == 0);
    let nat64 = s[0] == 0x64 && s[1] == 0xff9b && s[2..6].iter().all(|&seg| seg == 0);
    (compatible || nat64).then(|| {
        let [a, b] = s[6].to_be_bytes();
        let [c, d] = s[7].to_be_bytes();
        Ipv4Addr::new(a, b, c, d)
    })
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    let shared = a == 100 && (64..128).contains(&b);
    let benchmarking = a == 198 && (b == 18 || b == 19);
    let protocol_assignments = a == 192 && b == 0 && c == 0;
    let reserved = a >= 240;
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        || a == 0
        || shared
        || benchmarking
        || protocol_assignments
        || reserved)
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    let documentation = first == 0x2001 && ip.segments()[1] == 0x0db8;
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || unique_local
        || link_local
        || documentation)
}
