// ── Collaborator seams ──
//
// The decision layer never talks to the OS or the network directly.
// Everything it needs from outside goes through these traits so the
// pipeline can be driven by fakes under a paused clock.

use std::net::IpAddr;

use async_trait::async_trait;
use url::Url;

use crate::error::CoreError;
use crate::model::ProxyEndpoint;

/// Read-only view of the host's network attachment.
///
/// Each call may fail independently; the snapshot builder degrades a
/// failed field instead of giving up on the whole capture.
#[async_trait]
pub trait SystemQuery: Send + Sync {
    async fn current_ssid(&self) -> Result<Option<String>, CoreError>;

    /// Search domains of the primary active service.
    async fn search_domains(&self) -> Result<Vec<String>, CoreError>;

    async fn vpn_active(&self) -> Result<bool, CoreError>;

    async fn active_service_id(&self) -> Result<String, CoreError>;

    /// Monotonic OS-level change counter, where the platform exposes one.
    async fn change_counter(&self) -> Option<u64> {
        None
    }
}

/// System proxy setting handed to the mutation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemProxy {
    Disabled,
    Manual(ProxyEndpoint),
    AutoConfig(Url),
}

/// Host settings writer. Every call must be idempotent.
#[async_trait]
pub trait SystemMutator: Send + Sync {
    async fn set_dns_servers(&self, servers: &[IpAddr]) -> Result<(), CoreError>;

    async fn set_search_domains(&self, domains: &[String]) -> Result<(), CoreError>;

    async fn set_proxy(&self, proxy: &SystemProxy) -> Result<(), CoreError>;

    async fn set_default_printer(&self, printer: &str) -> Result<(), CoreError>;

    async fn set_ntp_server(&self, server: &str) -> Result<(), CoreError>;
}

/// How a fetch routes relative to the host's configured proxy. Discovery
/// scripts only ever travel direct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRoute {
    /// Connect straight to the origin, ignoring every proxy setting.
    Bypass,
}

/// Fetches an auto-discovery script body.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, route: ProxyRoute) -> Result<String, CoreError>;
}
