// ── In-memory collaborators for unit tests ──

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::CoreError;
use crate::provider::{ProxyRoute, ScriptFetcher, SystemMutator, SystemProxy, SystemQuery};

pub(crate) fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

// ── Script fetcher ───────────────────────────────────────────────────

pub(crate) struct FakeFetcher {
    body: Mutex<Option<String>>,
    delay: Duration,
    routes: Mutex<Vec<ProxyRoute>>,
}

impl FakeFetcher {
    pub(crate) fn serving(body: &str) -> Self {
        Self {
            body: Mutex::new(Some(body.to_owned())),
            delay: Duration::ZERO,
            routes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            body: Mutex::new(None),
            delay: Duration::ZERO,
            routes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn set_body(&self, body: Option<&str>) {
        *self.body.lock().unwrap() = body.map(str::to_owned);
    }

    pub(crate) fn routes(&self) -> Vec<ProxyRoute> {
        self.routes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url, route: ProxyRoute) -> Result<String, CoreError> {
        self.routes.lock().unwrap().push(route);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let body = self.body.lock().unwrap().clone();
        body.ok_or_else(|| CoreError::ProxyDiscoveryUnavailable {
            url: url.to_string(),
            reason: "connection refused".into(),
        })
    }
}

// ── System query ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeNetwork {
    pub ssid: Option<String>,
    pub domains: Vec<String>,
    pub vpn: bool,
    pub service: String,
    pub counter: Option<u64>,
    pub ssid_fails: bool,
}

#[derive(Default)]
pub(crate) struct FakeQuery {
    state: Mutex<FakeNetwork>,
    delay: Mutex<Duration>,
    ssid_calls: AtomicUsize,
}

impl FakeQuery {
    pub(crate) fn new(state: FakeNetwork) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut FakeNetwork)) {
        f(&mut self.state.lock().unwrap());
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn ssid_calls(&self) -> usize {
        self.ssid_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn snapshot(&self) -> FakeNetwork {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl SystemQuery for FakeQuery {
    async fn current_ssid(&self) -> Result<Option<String>, CoreError> {
        self.ssid_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let state = self.snapshot();
        if state.ssid_fails {
            return Err(CoreError::query("ssid", "no Wi-Fi interface"));
        }
        Ok(state.ssid)
    }

    async fn search_domains(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.snapshot().domains)
    }

    async fn vpn_active(&self) -> Result<bool, CoreError> {
        Ok(self.snapshot().vpn)
    }

    async fn active_service_id(&self) -> Result<String, CoreError> {
        Ok(self.snapshot().service)
    }

    async fn change_counter(&self) -> Option<u64> {
        self.snapshot().counter
    }
}

// ── System mutator ───────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct RecordingMutator {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingMutator {
    pub(crate) fn fail(&self, setting: &'static str) {
        self.failing.lock().unwrap().insert(setting);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, setting: &'static str, detail: String) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push(format!("{setting}={detail}"));
        if self.failing.lock().unwrap().contains(setting) {
            return Err(CoreError::mutation(setting, "permission denied"));
        }
        Ok(())
    }
}

#[async_trait]
impl SystemMutator for RecordingMutator {
    async fn set_dns_servers(&self, servers: &[IpAddr]) -> Result<(), CoreError> {
        let list: Vec<String> = servers.iter().map(ToString::to_string).collect();
        self.record("dns_servers", list.join(","))
    }

    async fn set_search_domains(&self, domains: &[String]) -> Result<(), CoreError> {
        self.record("search_domains", domains.join(","))
    }

    async fn set_proxy(&self, proxy: &SystemProxy) -> Result<(), CoreError> {
        let detail = match proxy {
            SystemProxy::Disabled => "off".to_owned(),
            SystemProxy::Manual(endpoint) => endpoint.to_string(),
            SystemProxy::AutoConfig(url) => format!("auto {url}"),
        };
        self.record("proxy", detail)
    }

    async fn set_default_printer(&self, printer: &str) -> Result<(), CoreError> {
        self.record("printer", printer.to_owned())
    }

    async fn set_ntp_server(&self, server: &str) -> Result<(), CoreError> {
        self.record("ntp_server", server.to_owned())
    }
}
