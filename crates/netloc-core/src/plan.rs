// ── Apply plan ──
//
// Decides which host settings a settle should push for the winning
// profile. `None` for a field means "leave it alone", which is different
// from pushing an empty value.

use std::net::IpAddr;

use serde::Serialize;

use crate::model::{LocationProfile, NetworkSnapshot, ProxySpec};
use crate::provider::SystemProxy;

/// Suffixes of link-local search domains kept alongside profile domains.
const LOCAL_SUFFIXES: &[&str] = &[".local", ".arpa"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyPlan {
    pub dns_servers: Option<Vec<IpAddr>>,
    pub search_domains: Option<Vec<String>>,
    #[serde(serialize_with = "serialize_system_proxy")]
    pub proxy: SystemProxy,
    pub printer: Option<String>,
    pub ntp_server: Option<String>,
    /// Settings deliberately not touched, with the reason.
    pub held: Vec<(String, String)>,
}

impl ApplyPlan {
    pub fn build(profile: &LocationProfile, snapshot: &NetworkSnapshot) -> Self {
        let mut held = Vec::new();

        let (dns_servers, search_domains) = if snapshot.vpn_active {
            held.push(("dns".to_owned(), "VPN owns resolver configuration".to_owned()));
            (None, None)
        } else {
            let servers = if profile.dns_servers.is_empty() {
                held.push(("dns_servers".to_owned(), "none configured, DHCP keeps control".to_owned()));
                None
            } else {
                Some(profile.dns_servers.clone())
            };
            (servers, merged_search_domains(profile, snapshot))
        };

        let proxy = match &profile.proxy_spec {
            ProxySpec::Empty => SystemProxy::Disabled,
            ProxySpec::Static(endpoint) => SystemProxy::Manual(endpoint.clone()),
            ProxySpec::AutoDiscovery { url } => SystemProxy::AutoConfig(url.clone()),
        };

        Self {
            dns_servers,
            search_domains,
            proxy,
            printer: profile.printer.clone(),
            ntp_server: profile.ntp_server.clone(),
            held,
        }
    }
}

/// Profile domains first, then any link-local domains the network
/// already hands out. Without profile domains the current list stands.
fn merged_search_domains(profile: &LocationProfile, snapshot: &NetworkSnapshot) -> Option<Vec<String>> {
    if profile.dns_search_domains.is_empty() {
        return None;
    }

    let mut merged: Vec<String> = profile.dns_search_domains.iter().cloned().collect();
    for domain in &snapshot.dns_search_domains {
        let local = LOCAL_SUFFIXES.iter().any(|s| domain.ends_with(s));
        if local && !merged.contains(domain) {
            merged.push(domain.clone());
        }
    }
    Some(merged)
}

fn serialize_system_proxy<S: serde::Serializer>(proxy: &SystemProxy, s: S) -> Result<S::Ok, S::Error> {
    match proxy {
        SystemProxy::Disabled => s.serialize_str("disabled"),
        SystemProxy::Manual(endpoint) => s.collect_str(endpoint),
        SystemProxy::AutoConfig(url) => s.collect_str(&format_args!("auto-config {url}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn work() -> LocationProfile {
        LocationProfile::new("work")
            .with_domains(["corp.example.com"])
            .with_dns_servers(vec!["10.0.0.53".parse().unwrap()])
            .with_proxy("http://wpad.corp/wpad.dat".parse().unwrap())
            .with_printer(Some("Office".into()))
    }

    fn snapshot(domains: &[&str], vpn: bool) -> NetworkSnapshot {
        NetworkSnapshot::new(None, domains.iter().map(|d| (*d).to_owned()), vpn, "svc")
    }

    #[test]
    fn keeps_local_domains_after_profile_domains() {
        let plan = ApplyPlan::build(&work(), &snapshot(&["home.arpa", "isp.example.net", "mac.local"], false));

        assert_eq!(
            plan.search_domains.unwrap(),
            vec!["corp.example.com", "home.arpa", "mac.local"]
        );
        assert_eq!(plan.dns_servers.unwrap().len(), 1);
        assert!(matches!(plan.proxy, SystemProxy::AutoConfig(_)));
        assert_eq!(plan.printer.as_deref(), Some("Office"));
        assert_eq!(plan.ntp_server, None);
    }

    #[test]
    fn vpn_holds_all_dns_settings() {
        let plan = ApplyPlan::build(&work(), &snapshot(&["corp.example.com"], true));

        assert_eq!(plan.dns_servers, None);
        assert_eq!(plan.search_domains, None);
        assert_eq!(plan.held[0].0, "dns");
        assert!(matches!(plan.proxy, SystemProxy::AutoConfig(_)));
    }

    #[test]
    fn empty_profile_leaves_dns_alone_and_disables_proxy() {
        let plan = ApplyPlan::build(&LocationProfile::new("default"), &snapshot(&["isp.example.net"], false));

        assert_eq!(plan.dns_servers, None);
        assert_eq!(plan.search_domains, None);
        assert_eq!(plan.proxy, SystemProxy::Disabled);
    }
}
