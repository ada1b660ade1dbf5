// ── Settle pipeline ──
//
// One settle = capture → match → resolve → apply. The `Settler` owns the
// state cache and the last known-good proxy; only the coordinator's
// worker (or a one-shot CLI invocation) ever holds it, so every settle
// sees the results of the previous one and never overlaps it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheEntry, StateCache};
use crate::capture::SnapshotBuilder;
use crate::config::{ShellSettings, WatcherConfig};
use crate::matcher::match_location;
use crate::model::{LocationProfile, LocationSet, NetworkSnapshot, ResolvedProxy};
use crate::pac::DirectiveParser;
use crate::plan::ApplyPlan;
use crate::provider::{ScriptFetcher, SystemMutator, SystemQuery};
use crate::resolver::{ProxyResolver, build_no_proxy};
use crate::shell::{self, ShellChange};

/// The three collaborators the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub query: Arc<dyn SystemQuery>,
    pub mutator: Arc<dyn SystemMutator>,
    pub fetcher: Arc<dyn ScriptFetcher>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SettleTrigger {
    Debounced,
    Manual,
}

/// What proxy the settle ended up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProxyOutcome {
    Resolved { proxy: ResolvedProxy },
    /// Discovery failed; the previous resolution of the same spec stands.
    Fallback { proxy: ResolvedProxy, reason: String },
    /// Discovery failed with nothing to fall back on.
    Unresolved { reason: String },
}

impl ProxyOutcome {
    /// The proxy to hand downstream, if one is known.
    pub fn effective(&self) -> Option<&ResolvedProxy> {
        match self {
            Self::Resolved { proxy } | Self::Fallback { proxy, .. } => Some(proxy),
            Self::Unresolved { .. } => None,
        }
    }
}

/// Capture, match, and resolve; no side effects on the host.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub snapshot: Arc<NetworkSnapshot>,
    pub location: Arc<LocationProfile>,
    pub location_changed: bool,
    pub from_cache: bool,
    pub degraded: Vec<String>,
    pub proxy: ProxyOutcome,
    pub plan: ApplyPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingResult {
    pub setting: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellResult {
    pub path: PathBuf,
    pub change: Option<ShellChange>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettleOutcome {
    /// 1-based count of settles performed by this settler.
    pub sequence: u64,
    pub trigger: SettleTrigger,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub applied: Vec<SettingResult>,
    pub shell: Vec<ShellResult>,
    pub finished_at: DateTime<Utc>,
}

impl SettleOutcome {
    pub fn failures(&self) -> impl Iterator<Item = &SettingResult> {
        self.applied.iter().filter(|r| r.error.is_some())
    }

    /// Failed settings plus failed rc-file updates.
    pub fn failure_count(&self) -> usize {
        self.failures().count() + self.shell.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

// ── Settler ──────────────────────────────────────────────────────────

pub struct Settler {
    builder: SnapshotBuilder,
    resolver: ProxyResolver,
    mutator: Arc<dyn SystemMutator>,
    locations: Arc<LocationSet>,
    probe_url: Url,
    shell: ShellSettings,
    cache: StateCache,
    sequence: u64,
}

impl Settler {
    pub fn new(collaborators: Collaborators, locations: Arc<LocationSet>, config: &WatcherConfig) -> Self {
        let parser = DirectiveParser::new(collaborators.fetcher, config.discovery_timeout);
        let no_proxy = build_no_proxy(&locations, &config.proxy_bypass);

        Self {
            builder: SnapshotBuilder::new(collaborators.query, config.query_timeout),
            resolver: ProxyResolver::new(parser, no_proxy),
            mutator: collaborators.mutator,
            locations,
            probe_url: config.probe_url.clone(),
            shell: config.shell.clone(),
            cache: StateCache::new(),
            sequence: 0,
        }
    }

    pub fn locations(&self) -> &LocationSet {
        &self.locations
    }

    /// Capture, match, and resolve, updating the cache. Touches nothing
    /// on the host.
    pub async fn evaluate(&mut self) -> Evaluation {
        let capture = self.builder.capture(&self.cache).await;
        let snapshot = capture.snapshot;
        let fingerprint = snapshot.fingerprint();

        let previous = self.cache.entry().map(|e| Arc::clone(&e.resolved_location));
        let location = match self.cache.location_for(fingerprint) {
            Some(location) => {
                debug!(location = %location.name, %fingerprint, "network unchanged, reusing location");
                location
            }
            None => match_location(&snapshot, &self.locations),
        };

        let location_changed = previous.as_ref().is_none_or(|p| p.name != location.name);
        if location_changed {
            info!(
                location = %location.name,
                previous = previous.as_ref().map_or("(none)", |p| p.name.as_str()),
                "location changed"
            );
        }

        self.cache.replace(CacheEntry::new(
            Arc::clone(&snapshot),
            Arc::clone(&location),
            capture.change_counter,
        ));

        let proxy = self.resolve_proxy(&location).await;
        let plan = ApplyPlan::build(&location, &snapshot);

        Evaluation {
            snapshot,
            location,
            location_changed,
            from_cache: capture.from_cache,
            degraded: capture.degraded,
            proxy,
            plan,
        }
    }

    async fn resolve_proxy(&mut self, location: &LocationProfile) -> ProxyOutcome {
        let spec = &location.proxy_spec;
        match self.resolver.resolve(spec, &self.probe_url).await {
            Ok(proxy) => {
                self.cache.remember_proxy(spec, &proxy);
                ProxyOutcome::Resolved { proxy }
            }
            Err(e) => {
                let reason = e.to_string();
                match self.cache.last_good_proxy(spec) {
                    Some(proxy) => {
                        warn!(error = %e, fallback = %proxy, "proxy resolution failed, keeping last known-good");
                        ProxyOutcome::Fallback {
                            proxy: proxy.clone(),
                            reason,
                        }
                    }
                    None => {
                        warn!(error = %e, "proxy resolution failed, no previous resolution");
                        ProxyOutcome::Unresolved { reason }
                    }
                }
            }
        }
    }

    /// Push an evaluation's plan to the host, one setting at a time. A
    /// failed setting is reported and the rest still go through.
    pub async fn apply(&self, evaluation: &Evaluation) -> (Vec<SettingResult>, Vec<ShellResult>) {
        let plan = &evaluation.plan;
        let mut applied = Vec::new();

        if let Some(servers) = &plan.dns_servers {
            applied.push(record("dns_servers", self.mutator.set_dns_servers(servers).await));
        }
        if let Some(domains) = &plan.search_domains {
            applied.push(record("search_domains", self.mutator.set_search_domains(domains).await));
        }
        applied.push(record("proxy", self.mutator.set_proxy(&plan.proxy).await));
        if let Some(printer) = &plan.printer {
            applied.push(record("printer", self.mutator.set_default_printer(printer).await));
        }
        if let Some(server) = &plan.ntp_server {
            applied.push(record("ntp_server", self.mutator.set_ntp_server(server).await));
        }

        let shell = self.apply_shell(&evaluation.proxy);
        (applied, shell)
    }

    fn apply_shell(&self, outcome: &ProxyOutcome) -> Vec<ShellResult> {
        if !self.shell.enabled {
            return Vec::new();
        }
        let Some(proxy) = outcome.effective() else {
            warn!("proxy unresolved, leaving shell proxy blocks untouched");
            return Vec::new();
        };

        self.shell
            .targets
            .iter()
            .map(|target| match shell::apply(&target.rc_file, proxy, target.kind.dialect()) {
                Ok(change) => ShellResult {
                    path: target.rc_file.clone(),
                    change: Some(change),
                    error: None,
                },
                Err(e) => {
                    warn!(error = %e, shell = %target.kind, "shell proxy update failed");
                    ShellResult {
                        path: target.rc_file.clone(),
                        change: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }

    /// Full settle: evaluate, then apply.
    pub async fn settle(&mut self, trigger: SettleTrigger) -> SettleOutcome {
        self.sequence += 1;
        let evaluation = self.evaluate().await;
        let (applied, shell) = self.apply(&evaluation).await;

        let outcome = SettleOutcome {
            sequence: self.sequence,
            trigger,
            evaluation,
            applied,
            shell,
            finished_at: Utc::now(),
        };

        info!(
            sequence = outcome.sequence,
            %trigger,
            location = %outcome.evaluation.location.name,
            proxy = %outcome.evaluation.proxy.effective().map_or_else(|| "unresolved".to_owned(), ToString::to_string),
            failures = outcome.failures().count(),
            "settled"
        );
        outcome
    }
}

fn record(setting: &str, result: Result<(), crate::CoreError>) -> SettingResult {
    match result {
        Ok(()) => SettingResult {
            setting: setting.to_owned(),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, setting, "mutation failed");
            SettingResult {
                setting: setting.to_owned(),
                error: Some(e.to_string()),
            }
        }
    }
}
