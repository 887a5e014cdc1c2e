use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors raised when a topic or hub URL fails validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which destinations outbound requests (topic fetches, hub requests) may reach.
///
/// The subscribe endpoint accepts arbitrary topic URLs from callers, so by
/// default loopback and private ranges are refused. Deployments that run a hub
/// on the same network opt in with `allow_private_networks`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkPolicy {
    pub allow_private_networks: bool,
}

impl NetworkPolicy {
    pub const PUBLIC_ONLY: Self = Self {
        allow_private_networks: false,
    };

    pub const ALLOW_PRIVATE: Self = Self {
        allow_private_networks: true,
    };
}

/// Parses and validates an outbound URL under the given policy.
///
/// Always rejects non-HTTP(S) schemes and host-less URLs. Unless the policy
/// allows private networks, also rejects `localhost`, loopback addresses and
/// private/link-local ranges (RFC 1918, fc00::/7, fe80::/10).
///
/// # Examples
///
/// ```
/// use websub_subscriber::util::{validate_url, NetworkPolicy};
///
/// let url = validate_url("https://example.org/feed", NetworkPolicy::PUBLIC_ONLY).unwrap();
/// assert_eq!(url.host_str(), Some("example.org"));
///
/// assert!(validate_url("http://localhost/feed", NetworkPolicy::PUBLIC_ONLY).is_err());
/// assert!(validate_url("http://localhost/feed", NetworkPolicy::ALLOW_PRIVATE).is_ok());
/// assert!(validate_url("file:///etc/passwd", NetworkPolicy::ALLOW_PRIVATE).is_err());
/// ```
pub fn validate_url(url_str: &str, policy: NetworkPolicy) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    if policy.allow_private_networks {
        return Ok(url);
    }

    if host == "localhost" {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
