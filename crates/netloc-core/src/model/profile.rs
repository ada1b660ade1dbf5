// ── Location profiles ──
//
// Operator-defined bundles of settings plus the criteria that select them.
// Loaded once at start-up and read-only afterwards; the matcher hands out
// `Arc` clones so a settle outcome can outlive the set it came from.

use std::net::IpAddr;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::warn;

use super::proxy::ProxySpec;
use super::snapshot::normalize_domain;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationProfile {
    pub name: String,
    pub ssids: IndexSet<String>,
    pub dns_search_domains: IndexSet<String>,
    pub dns_servers: Vec<IpAddr>,
    pub proxy_spec: ProxySpec,
    pub printer: Option<String>,
    pub ntp_server: Option<String>,
}

impl LocationProfile {
    /// A profile with no criteria and no settings.
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_name(name),
            ssids: IndexSet::new(),
            dns_search_domains: IndexSet::new(),
            dns_servers: Vec::new(),
            proxy_spec: ProxySpec::Empty,
            printer: None,
            ntp_server: None,
        }
    }

    pub fn with_ssids<I, S>(mut self, ssids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ssids = ssids
            .into_iter()
            .map(Into::into)
            .filter(|s: &String| !s.is_empty())
            .collect();
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dns_search_domains = domains
            .into_iter()
            .map(|d| normalize_domain(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    pub fn with_dns_servers(mut self, servers: Vec<IpAddr>) -> Self {
        self.dns_servers = servers;
        self
    }

    pub fn with_proxy(mut self, spec: ProxySpec) -> Self {
        self.proxy_spec = spec;
        self
    }

    pub fn with_printer(mut self, printer: Option<String>) -> Self {
        self.printer = printer.filter(|p| !p.is_empty());
        self
    }

    pub fn with_ntp_server(mut self, server: Option<String>) -> Self {
        self.ntp_server = server.filter(|s| !s.is_empty());
        self
    }

    /// No SSID and no domain criteria: matches every snapshot.
    pub fn is_wildcard(&self) -> bool {
        self.ssids.is_empty() && self.dns_search_domains.is_empty()
    }
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// ── LocationSet ──────────────────────────────────────────────────────

/// Ordered profiles with one designated default.
///
/// Order is precedence: the matcher walks `profiles()` front to back and
/// the first hit wins.
#[derive(Debug, Clone)]
pub struct LocationSet {
    profiles: Vec<Arc<LocationProfile>>,
    default_index: usize,
}

impl LocationSet {
    /// Validate and freeze a profile list.
    ///
    /// Fails on duplicate (case-normalized) names or when `default_name`
    /// is not among the profiles. Non-default wildcards are accepted but
    /// reported once through `tracing`.
    pub fn new(profiles: Vec<LocationProfile>, default_name: &str) -> Result<Self, CoreError> {
        let default_name = normalize_name(default_name);
        let mut seen = IndexSet::new();

        for profile in &profiles {
            if profile.name.is_empty() {
                return Err(CoreError::InvalidLocations {
                    message: "location name must not be empty".into(),
                });
            }
            if !seen.insert(profile.name.clone()) {
                return Err(CoreError::InvalidLocations {
                    message: format!("duplicate location '{}'", profile.name),
                });
            }
        }

        let default_index =
            seen.get_index_of(&default_name)
                .ok_or_else(|| CoreError::InvalidLocations {
                    message: format!("default location '{default_name}' is not defined"),
                })?;

        let set = Self {
            profiles: profiles.into_iter().map(Arc::new).collect(),
            default_index,
        };

        for warning in set.ambiguities() {
            warn!(error = %warning, "ambiguous location");
        }

        Ok(set)
    }

    pub fn profiles(&self) -> &[Arc<LocationProfile>] {
        &self.profiles
    }

    pub fn default_profile(&self) -> &Arc<LocationProfile> {
        // default_index is checked in `new` and the vector is never resized.
        &self.profiles[self.default_index]
    }

    pub fn is_default(&self, profile: &LocationProfile) -> bool {
        profile.name == self.default_profile().name
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LocationProfile>> {
        let name = normalize_name(name);
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Non-default profiles without criteria.
    pub fn ambiguities(&self) -> Vec<CoreError> {
        self.profiles
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != self.default_index && p.is_wildcard())
            .map(|(_, p)| CoreError::ConfigurationAmbiguous {
                profile: p.name.clone(),
            })
            .collect()
    }

    /// Every search domain configured on any profile, in profile order.
    pub fn all_domains(&self) -> IndexSet<String> {
        self.profiles
            .iter()
            .flat_map(|p| p.dns_search_domains.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_normalized_and_unique() {
        let err = LocationSet::new(
            vec![LocationProfile::new("Work"), LocationProfile::new("work ")],
            "work",
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidLocations { .. }));

        let set = LocationSet::new(
            vec![LocationProfile::new("Work"), LocationProfile::new("Default")],
            "DEFAULT",
        )
        .unwrap();
        assert_eq!(set.default_profile().name, "default");
        assert!(set.get("WORK").is_some());
    }

    #[test]
    fn missing_default_is_rejected() {
        let err = LocationSet::new(vec![LocationProfile::new("work")], "default").unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn non_default_wildcards_are_reported() {
        let set = LocationSet::new(
            vec![
                LocationProfile::new("work").with_ssids(["Corp"]),
                LocationProfile::new("cafe"),
                LocationProfile::new("default"),
            ],
            "default",
        )
        .unwrap();

        let ambiguous = set.ambiguities();
        assert_eq!(ambiguous.len(), 1);
        assert!(matches!(
            &ambiguous[0],
            CoreError::ConfigurationAmbiguous { profile } if profile == "cafe"
        ));
    }

    #[test]
    fn all_domains_is_the_ordered_union() {
        let set = LocationSet::new(
            vec![
                LocationProfile::new("work").with_domains(["corp.example.com", "Lab.Example.com."]),
                LocationProfile::new("home").with_domains(["home.arpa", "corp.example.com"]),
                LocationProfile::new("default"),
            ],
            "default",
        )
        .unwrap();

        let domains: Vec<_> = set.all_domains().into_iter().collect();
        assert_eq!(domains, ["corp.example.com", "lab.example.com", "home.arpa"]);
    }
}
