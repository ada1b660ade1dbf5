// ── Snapshot builder ──
//
// Runs the four system queries concurrently, each under its own timeout.
// A failed query degrades its field (absent SSID, no domains, VPN off,
// empty service id) so matching can still work with what did resolve.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::StateCache;
use crate::error::CoreError;
use crate::model::NetworkSnapshot;
use crate::provider::SystemQuery;

/// Result of one capture.
#[derive(Debug, Clone)]
pub struct Capture {
    pub snapshot: Arc<NetworkSnapshot>,
    pub change_counter: Option<u64>,
    pub from_cache: bool,
    /// Queries that failed and were degraded.
    pub degraded: Vec<String>,
}

#[derive(Clone)]
pub struct SnapshotBuilder {
    query: Arc<dyn SystemQuery>,
    timeout: Duration,
}

impl SnapshotBuilder {
    pub fn new(query: Arc<dyn SystemQuery>, timeout: Duration) -> Self {
        Self { query, timeout }
    }

    pub async fn capture(&self, cache: &StateCache) -> Capture {
        let change_counter = tokio::time::timeout(self.timeout, self.query.change_counter())
            .await
            .ok()
            .flatten();

        if let Some(snapshot) = cache.reusable_snapshot(change_counter) {
            debug!(counter = ?change_counter, "network unchanged, reusing cached snapshot");
            return Capture {
                snapshot,
                change_counter,
                from_cache: true,
                degraded: Vec::new(),
            };
        }

        let (ssid, domains, vpn, service) = tokio::join!(
            self.bounded("ssid", self.query.current_ssid()),
            self.bounded("search_domains", self.query.search_domains()),
            self.bounded("vpn_active", self.query.vpn_active()),
            self.bounded("active_service_id", self.query.active_service_id()),
        );

        let mut degraded = Vec::new();
        let ssid = degrade(ssid, &mut degraded);
        let domains = degrade(domains, &mut degraded);
        let vpn = degrade(vpn, &mut degraded);
        let service = degrade(service, &mut degraded);

        let snapshot = NetworkSnapshot::new(
            ssid.flatten(),
            domains.unwrap_or_default(),
            vpn.unwrap_or(false),
            service.unwrap_or_default(),
        );
        debug!(
            ssid = ?snapshot.ssid,
            domains = ?snapshot.dns_search_domains,
            vpn = snapshot.vpn_active,
            service = %snapshot.active_service_id,
            fingerprint = %snapshot.fingerprint(),
            "captured network snapshot"
        );

        Capture {
            snapshot: Arc::new(snapshot),
            change_counter,
            from_cache: false,
            degraded,
        }
    }

    async fn bounded<T>(
        &self,
        name: &'static str,
        fut: impl Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::query(
                name,
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

fn degrade<T>(result: Result<T, CoreError>, degraded: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "system query failed, field degraded");
            if let CoreError::QueryUnavailable { query, .. } = &e {
                degraded.push(query.clone());
            } else {
                degraded.push(e.to_string());
            }
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::model::LocationProfile;
    use crate::testing::{FakeNetwork, FakeQuery};

    fn network() -> FakeNetwork {
        FakeNetwork {
            ssid: Some("Corp".into()),
            domains: vec!["corp.example.com".into()],
            service: "svc-wifi".into(),
            ..FakeNetwork::default()
        }
    }

    #[tokio::test]
    async fn failed_query_degrades_only_its_field() {
        let query = Arc::new(FakeQuery::new(FakeNetwork {
            ssid_fails: true,
            ..network()
        }));
        let builder = SnapshotBuilder::new(query, Duration::from_secs(2));

        let capture = builder.capture(&StateCache::new()).await;

        assert_eq!(capture.snapshot.ssid, None);
        assert!(capture.snapshot.dns_search_domains.contains("corp.example.com"));
        assert_eq!(capture.degraded, vec!["ssid".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_query_is_bounded() {
        let query = Arc::new(FakeQuery::new(network()));
        query.set_delay(Duration::from_secs(60));
        let builder = SnapshotBuilder::new(query, Duration::from_secs(2));

        let capture = builder.capture(&StateCache::new()).await;

        assert_eq!(capture.snapshot.ssid, None);
        assert_eq!(capture.snapshot.active_service_id, "svc-wifi");
        assert_eq!(capture.degraded, vec!["ssid".to_owned()]);
    }

    #[tokio::test]
    async fn unchanged_counter_reuses_cached_snapshot() {
        let query = Arc::new(FakeQuery::new(FakeNetwork {
            counter: Some(41),
            ..network()
        }));
        let builder = SnapshotBuilder::new(query.clone(), Duration::from_secs(2));
        let mut cache = StateCache::new();

        let first = builder.capture(&cache).await;
        assert!(!first.from_cache);
        cache.replace(CacheEntry::new(
            first.snapshot.clone(),
            Arc::new(LocationProfile::new("work")),
            first.change_counter,
        ));

        let second = builder.capture(&cache).await;
        assert!(second.from_cache);
        assert_eq!(query.ssid_calls(), 1);

        query.update(|n| n.counter = Some(42));
        let third = builder.capture(&cache).await;
        assert!(!third.from_cache);
        assert_eq!(query.ssid_calls(), 2);
    }

    #[tokio::test]
    async fn without_counter_every_capture_is_fresh() {
        let query = Arc::new(FakeQuery::new(network()));
        let builder = SnapshotBuilder::new(query.clone(), Duration::from_secs(2));
        let mut cache = StateCache::new();

        let first = builder.capture(&cache).await;
        cache.replace(CacheEntry::new(first.snapshot, Arc::new(LocationProfile::new("work")), None));
        let second = builder.capture(&cache).await;

        assert!(!second.from_cache);
        assert_eq!(query.ssid_calls(), 2);
    }
}
