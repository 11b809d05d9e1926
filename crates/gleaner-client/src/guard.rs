//! Outbound address policy.
//!
//! Listing pages come from user input, so a server deployment must not be
//! usable to reach loopback, private, or link-local hosts (cloud metadata
//! endpoints in particular). The CLI runs on the user's own machine and
//! allows everything.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use gleaner_core::error::AppError;
use url::Url;

/// Which destinations a fetcher may contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressPolicy {
    /// http(s) only, and only hosts that resolve to public addresses.
    #[default]
    PublicOnly,
    /// Anything reqwest can fetch.
    AllowAll,
}

impl AddressPolicy {
    /// Reject `url` if this policy forbids it. Hostnames are resolved, and
    /// every resolved address must pass.
    pub async fn check(&self, url: &Url) -> Result<(), AppError> {
        if *self == AddressPolicy::AllowAll {
            return Ok(());
        }

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(AppError::HttpError(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| AppError::HttpError(format!("URL has no host: {url}")))?;
        // Bracketed IPv6 literals come back from `host_str` with brackets.
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return ensure_public(host, ip);
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let resolved: Vec<IpAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
            .map(|addr| addr.ip())
            .collect();
        if resolved.is_empty() {
            return Err(AppError::NetworkError(format!(
                "DNS resolution returned no addresses for {host}"
            )));
        }
        resolved.into_iter().try_for_each(|ip| ensure_public(host, ip))
    }
}

fn ensure_public(host: &str, ip: IpAddr) -> Result<(), AppError> {
    if is_reserved(ip) {
        Err(AppError::HttpError(format!(
            "Blocked request to {host}: {ip} is a private or reserved address"
        )))
    } else {
        Ok(())
    }
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => is_reserved_v6(v6),
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // 100.64.0.0/10, carrier-grade NAT
        || (a == 100 && (b & 0xC0) == 64)
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_reserved_v4(v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fe80::/10, link-local
        || (first & 0xFFC0) == 0xFE80
        // fc00::/7, unique local
        || (first & 0xFE00) == 0xFC00
}
