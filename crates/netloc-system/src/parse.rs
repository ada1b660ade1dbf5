//! Parsers for the text output of macOS network tools.
//!
//! All functions here are pure so they can be tested against captured
//! output. They are lenient: unknown lines are skipped, and a missing
//! value comes back as `None` or an empty list rather than an error.

/// Interface prefixes that indicate a tunnel owns the default route.
pub const VPN_PREFIXES: &[&str] = &["utun", "ppp", "ipsec"];

pub fn is_vpn_interface(name: &str) -> bool {
    VPN_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Value of a `Key : value` line, as printed by `scutil` dictionaries.
fn dict_value<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        (k.trim() == key).then(|| v.trim()).filter(|v| !v.is_empty())
    })
}

// ── scutil ──────────────────────────────────────────────────────────

/// Primary interface and service from `show State:/Network/Global/IPv4`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Primary {
    pub interface: Option<String>,
    pub service_id: Option<String>,
}

pub fn parse_primary(output: &str) -> Primary {
    Primary {
        interface: dict_value(output, "PrimaryInterface").map(str::to_owned),
        service_id: dict_value(output, "PrimaryService").map(str::to_owned),
    }
}

/// `UserDefinedName` from `show Setup:/Network/Service/<id>`.
pub fn parse_service_name(output: &str) -> Option<String> {
    dict_value(output, "UserDefinedName").map(str::to_owned)
}

/// Search domains of the `scutil --dns` resolver bound to `interface`.
///
/// Resolver blocks name their interface as `if_index : 6 (en0)`; the
/// first block for the interface that lists search domains wins.
pub fn parse_search_domains(dns_output: &str, interface: &str) -> Vec<String> {
    let tag = format!("({interface})");

    dns_output
        .split("resolver #")
        .filter(|block| block.contains(&tag))
        .map(|block| {
            block
                .lines()
                .filter_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    key.trim()
                        .starts_with("search domain[")
                        .then(|| value.trim().to_owned())
                })
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|domains| !domains.is_empty())
        .unwrap_or_default()
}

// ── networksetup ────────────────────────────────────────────────────

/// One entry of `networksetup -listallhardwareports`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwarePort {
    pub name: String,
    pub device: String,
}

impl HardwarePort {
    pub fn is_wifi(&self) -> bool {
        matches!(self.name.as_str(), "Wi-Fi" | "AirPort")
    }
}

pub fn parse_hardware_ports(output: &str) -> Vec<HardwarePort> {
    let mut ports = Vec::new();
    let mut name: Option<String> = None;

    for line in output.lines().map(str::trim) {
        if let Some(port) = line.strip_prefix("Hardware Port:") {
            name = Some(port.trim().to_owned());
        } else if let Some(device) = line.strip_prefix("Device:") {
            if let Some(name) = name.take() {
                ports.push(HardwarePort {
                    name,
                    device: device.trim().to_owned(),
                });
            }
        }
    }

    ports
}

/// SSID from `networksetup -getairportnetwork <device>`.
///
/// `Current Wi-Fi Network: Corp` on recent systems, `Current AirPort
/// Network: Corp` on older ones, and a sentence about not being
/// associated otherwise.
pub fn parse_airport_network(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Current ")?;
        let (_, ssid) = rest.split_once("Network:")?;
        let ssid = ssid.trim();
        (!ssid.is_empty()).then(|| ssid.to_owned())
    })
}

/// SSID from `ipconfig getsummary <device>`. Ignores the `BSSID` line.
pub fn parse_summary_ssid(output: &str) -> Option<String> {
    dict_value(output, "SSID").map(str::to_owned)
}

/// Pick the service that should receive DNS and proxy settings when the
/// primary interface is a tunnel: active wired ports first (Ethernet by
/// name, then USB LAN adapters, then any), then Wi-Fi.
pub fn choose_service(ports: &[HardwarePort], is_active: impl Fn(&str) -> bool) -> Option<String> {
    let active: Vec<&HardwarePort> = ports
        .iter()
        .filter(|p| !is_vpn_interface(&p.device) && is_active(&p.device))
        .collect();
    let wired: Vec<&HardwarePort> = active.iter().copied().filter(|p| !p.is_wifi()).collect();

    wired
        .iter()
        .find(|p| p.name.contains("Ethernet"))
        .or_else(|| wired.iter().find(|p| is_usb_lan(p)))
        .or_else(|| wired.first())
        .or_else(|| active.iter().find(|p| p.is_wifi()))
        .map(|p| p.name.clone())
}

fn is_usb_lan(port: &HardwarePort) -> bool {
    port.name.starts_with("USB") && port.name.ends_with("LAN")
}

// ── route ───────────────────────────────────────────────────────────

/// Interface of the default route from `route -n get default`.
pub fn parse_route_interface(output: &str) -> Option<String> {
    dict_value(output, "interface").map(str::to_owned)
}
