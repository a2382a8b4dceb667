use crate::error::SummarizeError;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

/// Configuration for URL validation
#[derive(Debug, Clone)]
pub struct UrlValidationConfig {
    /// Allowed URL schemes (default: ["http", "https"])
    pub allowed_schemes: HashSet<String>,
    /// Block private/local IP addresses (default: false)
    pub block_private_ips: bool,
    /// Block localhost addresses (default: false)
    pub block_localhost: bool,
    /// Domain blacklist
    pub blocked_domains: HashSet<String>,
    /// Domain whitelist (if not empty, only these domains are allowed)
    pub allowed_domains: HashSet<String>,
    /// Maximum number of redirects allowed
    pub max_redirects: usize,
}

impl Default for UrlValidationConfig {
    fn default() -> Self {
        let mut allowed_schemes = HashSet::new();
        allowed_schemes.insert("http".to_string());
        allowed_schemes.insert("https".to_string());

        Self {
            allowed_schemes,
            block_private_ips: false,
            block_localhost: false,
            blocked_domains: HashSet::new(),
            allowed_domains: HashSet::new(),
            max_redirects: 10,
        }
    }
}

impl UrlValidationConfig {
    /// Default schemes plus localhost and private network blocking.
    pub fn strict() -> Self {
        Self {
            block_private_ips: true,
            block_localhost: true,
            ..Self::default()
        }
    }
}

/// Validates a URL according to security policies
#[derive(Debug, Clone)]
pub struct UrlValidator {
    config: UrlValidationConfig,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::with_default_config()
    }
}

impl UrlValidator {
    pub fn new(config: UrlValidationConfig) -> Self {
        Self { config }
    }

    pub fn with_default_config() -> Self {
        Self::new(UrlValidationConfig::default())
    }

    pub fn config(&self) -> &UrlValidationConfig {
        &self.config
    }

    /// Validates a URL string
    pub fn validate(&self, url_str: &str) -> Result<Url, SummarizeError> {
        let url_str = url_str.trim();
        if url_str.chars().any(char::is_whitespace) {
            return Err(SummarizeError::InvalidUrl(format!(
                "'{url_str}' contains whitespace"
            )));
        }

        let url = Url::parse(url_str).map_err(|e| SummarizeError::InvalidUrl(e.to_string()))?;

        if !self.config.allowed_schemes.contains(url.scheme()) {
            return Err(SummarizeError::InvalidUrlScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SummarizeError::InvalidUrl("No host in URL".to_string()))?;

        if !self.config.allowed_domains.is_empty() {
            if !self.is_domain_allowed(host) {
                return Err(SummarizeError::DomainNotAllowed(host.to_string()));
            }
        } else if self.is_domain_blocked(host) {
            return Err(SummarizeError::DomainBlocked(host.to_string()));
        }

        if self.config.block_localhost && self.is_localhost(host) {
            return Err(SummarizeError::LocalhostBlocked);
        }

        if self.config.block_private_ips {
            // IPv6 hosts come back wrapped in brackets
            let ip_str = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);

            if let Ok(ip) = ip_str.parse::<IpAddr>() {
                if self.is_private_ip(&ip) {
                    return Err(SummarizeError::PrivateIpBlocked(ip.to_string()));
                }
            }
        }

        Ok(url)
    }

    fn is_domain_allowed(&self, host: &str) -> bool {
        self.config
            .allowed_domains
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }

    fn is_domain_blocked(&self, host: &str) -> bool {
        self.config
            .blocked_domains
            .iter()
            .any(|blocked| host == blocked || host.ends_with(&format!(".{blocked}")))
    }

    fn is_localhost(&self, host: &str) -> bool {
        matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]")
    }

    fn is_private_ip(&self, ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(ipv4) => {
                ipv4.is_private()
                    || ipv4.is_loopback()
                    || ipv4.is_link_local()
                    || ipv4.is_unspecified()
                    || self.is_ipv4_reserved(ipv4)
            }
            IpAddr::V6(ipv6) => {
                ipv6.is_loopback()
                    || ipv6.is_unspecified()
                    || self.is_ipv6_link_local(ipv6)
                    || self.is_ipv6_unique_local(ipv6)
            }
        }
    }

    fn is_ipv4_reserved(&self, ip: &Ipv4Addr) -> bool {
        let octets = ip.octets();

        // 0.0.0.0/8
        octets[0] == 0
            // 100.64.0.0/10 (Carrier-grade NAT)
            || (octets[0] == 100 && (octets[1] & 0b11000000) == 0b01000000)
            // 224.0.0.0/4 (Multicast)
            || (octets[0] & 0b11110000) == 0b11100000
            // 240.0.0.0/4 (Reserved)
            || (octets[0] & 0b11110000) == 0b11110000
    }

    fn is_ipv6_link_local(&self, ip: &Ipv6Addr) -> bool {
        // fe80::/10
        (ip.segments()[0] & 0xffc0) == 0xfe80
    }

    fn is_ipv6_unique_local(&self, ip: &Ipv6Addr) -> bool {
        // fc00::/7
        (ip.segments()[0] & 0xfe00) == 0xfc00
    }
}

/// Content size and time limits configuration
#[derive(Debug, Clone)]
pub struct ContentLimits {
    /// Maximum content size in bytes (default: 10MB)
    pub max_content_size: usize,
    /// Maximum download time in seconds (default: 30s)
    pub max_download_time: u64,
    /// Allowed content types (if not empty, only these are allowed)
    pub allowed_content_types: HashSet<String>,
}

impl Default for ContentLimits {
    fn default() -> Self {
        let mut allowed_types = HashSet::new();
        allowed_types.insert("text/html".to_string());
        allowed_types.insert("application/xhtml+xml".to_string());
        allowed_types.insert("text/plain".to_string());

        Self {
            max_content_size: 10 * 1024 * 1024,
            max_download_time: 30,
            allowed_content_types: allowed_types,
        }
    }
}

impl ContentLimits {
    /// Checks a `Content-Type` header value, ignoring parameters such as charset.
    pub fn is_content_type_allowed(&self, content_type: &str) -> bool {
        if self.allowed_content_types.is_empty() {
            return true;
        }
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types.contains(&mime)
    }
}
