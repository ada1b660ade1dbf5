// ── Settle state cache ──
//
// Owned by the settle turn and nothing else. Settles are serialized, so
// plain `&mut self` access is the whole locking story.

use std::sync::Arc;

use crate::model::{Fingerprint, LocationProfile, NetworkSnapshot, ProxySpec, ResolvedProxy};

/// Last settled snapshot and the profile it matched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub snapshot: Arc<NetworkSnapshot>,
    pub resolved_location: Arc<LocationProfile>,
    pub change_counter: Option<u64>,
}

impl CacheEntry {
    pub fn new(
        snapshot: Arc<NetworkSnapshot>,
        resolved_location: Arc<LocationProfile>,
        change_counter: Option<u64>,
    ) -> Self {
        Self {
            fingerprint: snapshot.fingerprint(),
            snapshot,
            resolved_location,
            change_counter,
        }
    }
}

#[derive(Debug, Default)]
pub struct StateCache {
    entry: Option<CacheEntry>,
    last_good_proxy: Option<(ProxySpec, ResolvedProxy)>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    /// The cached snapshot, if the OS reports the same change counter it
    /// reported when that snapshot was taken. Without a counter nothing
    /// can be proven unchanged, so nothing is reused.
    pub fn reusable_snapshot(&self, counter: Option<u64>) -> Option<Arc<NetworkSnapshot>> {
        let counter = counter?;
        self.entry
            .as_ref()
            .filter(|e| e.change_counter == Some(counter))
            .map(|e| Arc::clone(&e.snapshot))
    }

    /// The profile matched for `fingerprint`, only if it is the cached one.
    pub fn location_for(&self, fingerprint: Fingerprint) -> Option<Arc<LocationProfile>> {
        self.entry
            .as_ref()
            .filter(|e| e.fingerprint == fingerprint)
            .map(|e| Arc::clone(&e.resolved_location))
    }

    pub fn replace(&mut self, entry: CacheEntry) {
        self.entry = Some(entry);
    }

    pub fn remember_proxy(&mut self, spec: &ProxySpec, resolved: &ResolvedProxy) {
        self.last_good_proxy = Some((spec.clone(), resolved.clone()));
    }

    /// Last successful resolution of exactly `spec`. A resolution made for
    /// a different spec is never offered as a stand-in.
    pub fn last_good_proxy(&self, spec: &ProxySpec) -> Option<&ResolvedProxy> {
        self.last_good_proxy
            .as_ref()
            .filter(|(cached, _)| cached == spec)
            .map(|(_, resolved)| resolved)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use indexmap::IndexSet;

    use super::*;
    use crate::model::{ProxyEndpoint, ProxyKind};

    fn snap(ssid: &str) -> Arc<NetworkSnapshot> {
        Arc::new(NetworkSnapshot::new(Some(ssid.into()), Vec::new(), false, "svc"))
    }

    #[test]
    fn location_is_only_served_for_the_same_fingerprint() {
        let mut cache = StateCache::new();
        let work = Arc::new(LocationProfile::new("work"));
        cache.replace(CacheEntry::new(snap("Corp"), work, None));

        assert_eq!(cache.location_for(snap("Corp").fingerprint()).unwrap().name, "work");
        assert!(cache.location_for(snap("Cafe").fingerprint()).is_none());
    }

    #[test]
    fn snapshot_reuse_requires_matching_counter() {
        let mut cache = StateCache::new();
        cache.replace(CacheEntry::new(snap("Corp"), Arc::new(LocationProfile::new("work")), Some(7)));

        assert!(cache.reusable_snapshot(Some(7)).is_some());
        assert!(cache.reusable_snapshot(Some(8)).is_none());
        assert!(cache.reusable_snapshot(None).is_none());
    }

    #[test]
    fn last_good_proxy_is_keyed_by_spec() {
        let mut cache = StateCache::new();
        let spec: ProxySpec = "http://wpad.corp/wpad.dat".parse().unwrap();
        let other: ProxySpec = "http://wpad.lab/wpad.dat".parse().unwrap();
        let resolved = ResolvedProxy::from_endpoint(
            ProxyEndpoint {
                kind: ProxyKind::Http,
                host: "p1".into(),
                port: 8080,
            },
            IndexSet::new(),
        );

        cache.remember_proxy(&spec, &resolved);

        assert_eq!(cache.last_good_proxy(&spec), Some(&resolved));
        assert_eq!(cache.last_good_proxy(&other), None);
    }
}
