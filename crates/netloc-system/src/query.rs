// ── macOS query provider ──
//
// Reads the network attachment through scutil, networksetup, ipconfig,
// and route. Each `SystemQuery` method issues its own commands so one
// failing tool only degrades its own snapshot field.

use std::sync::Arc;

use async_trait::async_trait;
use netloc_core::{CoreError, SystemQuery};
use tracing::debug;

use crate::command::{CommandLine, Exec};
use crate::error::SystemError;
use crate::parse::{self, HardwarePort, Primary};

pub(crate) async fn primary(exec: &dyn Exec) -> Result<Primary, SystemError> {
    let out = exec
        .run(&CommandLine::new("scutil").stdin("show State:/Network/Global/IPv4\n"))
        .await?;
    Ok(parse::parse_primary(&out))
}

pub(crate) async fn hardware_ports(exec: &dyn Exec) -> Result<Vec<HardwarePort>, SystemError> {
    let out = exec
        .run(&CommandLine::new("networksetup").arg("-listallhardwareports"))
        .await?;
    Ok(parse::parse_hardware_ports(&out))
}

/// Interface carrying the default route, if there is one. `route` exits
/// non-zero when no default route exists, which is not an error here.
pub(crate) async fn default_route_interface(exec: &dyn Exec) -> Result<Option<String>, SystemError> {
    match exec
        .run(&CommandLine::new("route").args(["-n", "get", "default"]))
        .await
    {
        Ok(out) => Ok(parse::parse_route_interface(&out)),
        Err(SystemError::Failed { stderr, .. }) => {
            debug!(%stderr, "no default route");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Name of the network service that settings should be written to.
///
/// Normally the primary service. When a tunnel is primary, the active
/// physical service underneath it is used instead, since tunnel services
/// are owned by the VPN client.
pub(crate) async fn configurable_service(exec: &dyn Exec) -> Result<String, SystemError> {
    let primary = primary(exec).await?;

    if let (Some(interface), Some(service_id)) = (&primary.interface, &primary.service_id) {
        if !parse::is_vpn_interface(interface) {
            let out = exec
                .run(&CommandLine::new("scutil").stdin(format!("show Setup:/Network/Service/{service_id}\n")))
                .await?;
            if let Some(name) = parse::parse_service_name(&out) {
                return Ok(name);
            }
        }
    }

    let ports = hardware_ports(exec).await?;
    let mut active = Vec::new();
    for port in &ports {
        let addr = exec
            .run(&CommandLine::new("ipconfig").args(["getifaddr", port.device.as_str()]))
            .await;
        if addr.is_ok_and(|a| !a.trim().is_empty()) {
            active.push(port.device.clone());
        }
    }

    let service = parse::choose_service(&ports, |device| active.iter().any(|a| a == device))
        .ok_or_else(|| SystemError::parse("networksetup", "no active network service"))?;
    debug!(%service, "primary service unavailable, using active physical service");
    Ok(service)
}

/// `SystemQuery` backed by macOS command-line tools.
#[derive(Clone)]
pub struct MacSystemQuery {
    exec: Arc<dyn Exec>,
}

impl MacSystemQuery {
    pub fn new(exec: Arc<dyn Exec>) -> Self {
        Self { exec }
    }

    async fn ssid(&self) -> Result<Option<String>, SystemError> {
        let ports = hardware_ports(self.exec.as_ref()).await?;
        let Some(wifi) = ports.iter().find(|p| p.is_wifi()) else {
            return Ok(None);
        };

        let out = self
            .exec
            .run(&CommandLine::new("networksetup").args(["-getairportnetwork", wifi.device.as_str()]))
            .await?;
        if let Some(ssid) = parse::parse_airport_network(&out) {
            return Ok(Some(ssid));
        }

        // Newer releases redact the airport answer; the DHCP summary
        // still carries the network name.
        let out = self
            .exec
            .run(&CommandLine::new("ipconfig").args(["getsummary", wifi.device.as_str()]))
            .await?;
        Ok(parse::parse_summary_ssid(&out).filter(|s| s != "<redacted>"))
    }

    async fn domains(&self) -> Result<Vec<String>, SystemError> {
        let Some(interface) = primary(self.exec.as_ref()).await?.interface else {
            return Ok(Vec::new());
        };
        let out = self.exec.run(&CommandLine::new("scutil").arg("--dns")).await?;
        Ok(parse::parse_search_domains(&out, &interface))
    }
}

#[async_trait]
impl SystemQuery for MacSystemQuery {
    async fn current_ssid(&self) -> Result<Option<String>, CoreError> {
        self.ssid().await.map_err(|e| e.into_query("ssid"))
    }

    async fn search_domains(&self) -> Result<Vec<String>, CoreError> {
        self.domains().await.map_err(|e| e.into_query("search_domains"))
    }

    async fn vpn_active(&self) -> Result<bool, CoreError> {
        default_route_interface(self.exec.as_ref())
            .await
            .map(|iface| iface.is_some_and(|i| parse::is_vpn_interface(&i)))
            .map_err(|e| e.into_query("vpn_active"))
    }

    async fn active_service_id(&self) -> Result<String, CoreError> {
        primary(self.exec.as_ref())
            .await
            .map_err(|e| e.into_query("active_service_id"))?
            .service_id
            .ok_or_else(|| CoreError::query("active_service_id", "no primary service"))
    }
}
