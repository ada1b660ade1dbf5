// ── Proxy model ──
//
// Three stages of a proxy decision:
//   ProxySpec      what the operator configured, classified once at load time
//   ProxyDirective one entry of an auto-discovery answer
//   ResolvedProxy  the terminal decision handed to setters and the shell formatter
//
// Hosts are always stored bare (no scheme, no brackets). The only place a
// scheme is ever attached is `ResolvedProxy::url`, so a proxy URL is
// composed exactly once.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::Serialize;
use strum::{Display, EnumString};
use url::Url;

use crate::error::CoreError;

/// Port assumed for a bare `host` with no port and no scheme.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    None,
    Http,
    Https,
    Socks,
}

impl ProxyKind {
    /// URL scheme used when composing a proxy URL of this kind.
    pub fn scheme(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Http => Some("http"),
            Self::Https => Some("https"),
            Self::Socks => Some("socks5"),
        }
    }

    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "socks" | "socks4" | "socks5" | "socks5h" => Some(Self::Socks),
            _ => None,
        }
    }
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// A typed proxy address with a bare host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProxyEndpoint {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, join_host_port(&self.host, self.port))
    }
}

/// Split an address such as `p1:8080`, `http://p1:8080/` or `[::1]:3128`
/// into a bare host and a port. Any scheme prefix is discarded here so
/// later composition never stacks a second one on top.
pub(crate) fn split_host_port(raw: &str) -> Result<(String, u16), String> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest)
        .trim_end_matches('/');

    if without_scheme.is_empty() {
        return Err("missing host".into());
    }
    if without_scheme.contains('/') || without_scheme.contains(char::is_whitespace) {
        return Err("expected host:port".into());
    }

    let (host, port) = if let Some(rest) = without_scheme.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or("unterminated IPv6 literal")?;
        let port = tail.strip_prefix(':').ok_or("missing port")?;
        (host, port)
    } else {
        without_scheme.rsplit_once(':').ok_or("missing port")?
    };

    if host.is_empty() {
        return Err("missing host".into());
    }
    let port: u16 = port
        .parse()
        .map_err(|_| format!("invalid port '{port}'"))?;
    if port == 0 {
        return Err("port must be non-zero".into());
    }

    Ok((host.to_ascii_lowercase(), port))
}

/// Whether the authority of `raw` spells out a port. `Url` drops a port
/// equal to the scheme default, so the text is checked instead.
fn has_explicit_port(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let tail = host_port.rsplit_once(']').map_or(host_port, |(_, t)| t);
    tail.rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

// ── ProxySpec ────────────────────────────────────────────────────────

/// Operator-configured proxy, classified once from the config string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxySpec {
    #[default]
    Empty,
    Static(ProxyEndpoint),
    AutoDiscovery { url: Url },
}

impl ProxySpec {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl FromStr for ProxySpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Ok(Self::Empty);
        }

        let invalid = |reason: String| CoreError::InvalidProxySpec {
            value: value.to_owned(),
            reason,
        };

        // Bare `host:port` or `host`: an HTTP proxy.
        if !value.contains("://") {
            let (host, port) = match split_host_port(value) {
                Ok(pair) => pair,
                Err(_) if !value.contains(':') && !value.contains('/') => {
                    (value.to_ascii_lowercase(), DEFAULT_PROXY_PORT)
                }
                Err(reason) => return Err(invalid(reason)),
            };
            return Ok(Self::Static(ProxyEndpoint {
                kind: ProxyKind::Http,
                host,
                port,
            }));
        }

        let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
        let is_root = matches!(url.path(), "" | "/") && url.query().is_none();

        // Only an explicit port makes a proxy URL static; `http://wpad.corp/`
        // names a discovery script served from the root.
        if let (Some(kind), true) = (ProxyKind::from_scheme(url.scheme()), is_root) {
            if has_explicit_port(value) {
                let host = match url.host() {
                    Some(url::Host::Ipv6(addr)) => addr.to_string(),
                    Some(host) => host.to_string(),
                    None => return Err(invalid("missing host".into())),
                };
                let port = url
                    .port_or_known_default()
                    .ok_or_else(|| invalid("missing port".into()))?;
                return Ok(Self::Static(ProxyEndpoint { kind, host, port }));
            }
            if kind == ProxyKind::Socks {
                return Err(invalid("a SOCKS proxy needs an explicit port".into()));
            }
        }

        match url.scheme() {
            "http" | "https" | "file" => Ok(Self::AutoDiscovery { url }),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }
}

impl fmt::Display for ProxySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("none"),
            Self::Static(endpoint) => write!(f, "{endpoint}"),
            Self::AutoDiscovery { url } => write!(f, "auto-discovery {url}"),
        }
    }
}

// ── ProxyDirective ───────────────────────────────────────────────────

/// One entry of an auto-discovery answer, in the order it was returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyDirective {
    Direct,
    HttpProxy { host: String, port: u16 },
    HttpsProxy { host: String, port: u16 },
    SocksProxy { host: String, port: u16 },
}

impl ProxyDirective {
    pub fn endpoint(&self) -> Option<ProxyEndpoint> {
        let (kind, host, port) = match self {
            Self::Direct => return None,
            Self::HttpProxy { host, port } => (ProxyKind::Http, host, *port),
            Self::HttpsProxy { host, port } => (ProxyKind::Https, host, *port),
            Self::SocksProxy { host, port } => (ProxyKind::Socks, host, *port),
        };
        Some(ProxyEndpoint {
            kind,
            host: host.clone(),
            port,
        })
    }
}

impl FromStr for ProxyDirective {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let malformed = |reason: &str| CoreError::MalformedDirective {
            token: token.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parts = token.split_whitespace();
        let keyword = parts.next().ok_or_else(|| malformed("empty directive"))?;
        let address = parts.next();
        if parts.next().is_some() {
            return Err(malformed("unexpected trailing text"));
        }

        let keyword = keyword.to_ascii_uppercase();
        if keyword == "DIRECT" {
            return match address {
                None => Ok(Self::Direct),
                Some(_) => Err(malformed("DIRECT takes no address")),
            };
        }

        let address = address.ok_or_else(|| malformed("missing host:port"))?;
        let (host, port) = split_host_port(address).map_err(|reason| malformed(&reason))?;

        match keyword.as_str() {
            "PROXY" | "HTTP" => Ok(Self::HttpProxy { host, port }),
            "HTTPS" => Ok(Self::HttpsProxy { host, port }),
            "SOCKS" | "SOCKS4" | "SOCKS5" => Ok(Self::SocksProxy { host, port }),
            _ => Err(malformed("unknown keyword")),
        }
    }
}

// ── ResolvedProxy ────────────────────────────────────────────────────

/// The terminal proxy decision. A `None` kind never carries a host,
/// port, or bypass list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedProxy {
    kind: ProxyKind,
    host: String,
    port: u16,
    no_proxy: IndexSet<String>,
}

impl ResolvedProxy {
    pub fn none() -> Self {
        Self {
            kind: ProxyKind::None,
            host: String::new(),
            port: 0,
            no_proxy: IndexSet::new(),
        }
    }

    pub fn from_endpoint(endpoint: ProxyEndpoint, no_proxy: IndexSet<String>) -> Self {
        if endpoint.kind == ProxyKind::None {
            return Self::none();
        }
        Self {
            kind: endpoint.kind,
            host: endpoint.host,
            port: endpoint.port,
            no_proxy,
        }
    }

    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn no_proxy(&self) -> &IndexSet<String> {
        &self.no_proxy
    }

    pub fn is_none(&self) -> bool {
        self.kind == ProxyKind::None
    }

    /// `host:port` without a scheme, bracketing IPv6 literals.
    pub fn host_port(&self) -> Option<String> {
        (!self.is_none()).then(|| join_host_port(&self.host, self.port))
    }

    /// The single scheme + host + port composition.
    pub fn url(&self) -> Option<String> {
        let scheme = self.kind.scheme()?;
        Some(format!("{scheme}://{}", join_host_port(&self.host, self.port)))
    }

    pub fn no_proxy_list(&self) -> String {
        self.no_proxy.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for ResolvedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url() {
            Some(url) => f.write_str(&url),
            None => f.write_str("none"),
        }
    }
}
