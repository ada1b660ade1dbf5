// ── Network snapshot ──
//
// Immutable record of what the host is attached to at one instant.
// A new settle always produces a new snapshot; nothing edits one in place.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;

/// Opaque hash over the semantically relevant fields of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint(u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSnapshot {
    pub ssid: Option<String>,
    pub dns_search_domains: IndexSet<String>,
    pub vpn_active: bool,
    pub active_service_id: String,
    pub captured_at: DateTime<Utc>,
}

impl NetworkSnapshot {
    /// Build a snapshot stamped with the current time.
    ///
    /// Domains are lower-cased and stripped of a trailing dot so matching
    /// never has to care how the resolver happened to spell them.
    pub fn new(
        ssid: Option<String>,
        domains: impl IntoIterator<Item = String>,
        vpn_active: bool,
        active_service_id: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.filter(|s| !s.is_empty()),
            dns_search_domains: domains
                .into_iter()
                .map(|d| normalize_domain(&d))
                .filter(|d| !d.is_empty())
                .collect(),
            vpn_active,
            active_service_id: active_service_id.into(),
            captured_at: Utc::now(),
        }
    }

    /// Hash of every field except `captured_at`.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        self.ssid.hash(&mut hasher);
        for domain in &self.dns_search_domains {
            domain.hash(&mut hasher);
        }
        self.dns_search_domains.len().hash(&mut hasher);
        self.vpn_active.hash(&mut hasher);
        self.active_service_id.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }
}

impl PartialEq for NetworkSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ssid == other.ssid
            && self.dns_search_domains == other.dns_search_domains
            && self.vpn_active == other.vpn_active
            && self.active_service_id == other.active_service_id
    }
}

impl Eq for NetworkSnapshot {}

pub(crate) fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}
