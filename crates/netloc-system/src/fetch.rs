// ── Auto-discovery script fetcher ──
//
// One reqwest client that ignores every proxy setting, so a stale proxy
// can never block the script that replaces it. `file://` URLs are read
// from disk.

use std::time::Duration;

use async_trait::async_trait;
use netloc_core::{CoreError, ProxyRoute, ScriptFetcher};
use tracing::debug;
use url::Url;

use crate::error::SystemError;

const USER_AGENT: &str = concat!("netloc/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpScriptFetcher {
    direct: reqwest::Client,
    timeout: Duration,
}

impl HttpScriptFetcher {
    pub fn new(timeout: Duration) -> Result<Self, SystemError> {
        let direct = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .no_proxy()
            .build()?;
        Ok(Self { direct, timeout })
    }

    fn unavailable(url: &Url, reason: impl ToString) -> CoreError {
        CoreError::ProxyDiscoveryUnavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn fetch_http(&self, url: &Url) -> Result<String, CoreError> {
        let response = self.direct.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                Self::unavailable(url, format!("timed out after {}s", self.timeout.as_secs()))
            } else {
                Self::unavailable(url, SystemError::Http(e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::unavailable(url, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::unavailable(url, SystemError::Http(e)))?;
        debug!(%url, bytes = body.len(), "fetched discovery script");
        Ok(body)
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch(&self, url: &Url, route: ProxyRoute) -> Result<String, CoreError> {
        let ProxyRoute::Bypass = route;
        match url.scheme() {
            "http" | "https" => self.fetch_http(url).await,
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| Self::unavailable(url, "not a local path"))?;
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| Self::unavailable(url, e))
            }
            other => Err(Self::unavailable(url, format!("unsupported scheme '{other}'"))),
        }
    }
}
