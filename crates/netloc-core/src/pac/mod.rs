//! Auto-discovery (PAC/WPAD) support.
//!
//! [`DirectiveParser::parse`] fetches a script, answers its routing
//! function for one target URL, and splits the answer into
//! [`ProxyDirective`]s. The fetch always bypasses any configured proxy:
//! reaching the script must never depend on the proxy it describes.

mod directive;
mod script;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

pub use directive::parse_directives;

use crate::error::CoreError;
use crate::model::ProxyDirective;
use crate::provider::{ProxyRoute, ScriptFetcher};

#[derive(Clone)]
pub struct DirectiveParser {
    fetcher: Arc<dyn ScriptFetcher>,
    timeout: Duration,
}

impl DirectiveParser {
    pub fn new(fetcher: Arc<dyn ScriptFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch `script_url` and return the directives it yields for `target`.
    ///
    /// Fetch failures, timeouts, and scripts that yield no usable
    /// directive all surface as `ProxyDiscoveryUnavailable`.
    pub async fn parse(
        &self,
        script_url: &Url,
        target: &Url,
    ) -> Result<Vec<ProxyDirective>, CoreError> {
        let unavailable = |reason: String| CoreError::ProxyDiscoveryUnavailable {
            url: script_url.to_string(),
            reason,
        };

        let fetch = self.fetcher.fetch(script_url, ProxyRoute::Bypass);
        let script = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(unavailable(e.to_string())),
            Err(_) => {
                return Err(unavailable(format!(
                    "fetch timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };
        debug!(url = %script_url, bytes = script.len(), "fetched auto-discovery script");

        let answer = script::find_proxy_for_url(&script, target).map_err(unavailable)?;
        debug!(target = %target, answer = %answer, "auto-discovery answer");

        let (directives, skipped) = parse_directives(&answer);
        if directives.is_empty() {
            return Err(unavailable(format!(
                "answer '{answer}' contained no usable directive"
            )));
        }
        if !skipped.is_empty() {
            warn!(
                url = %script_url,
                skipped = skipped.len(),
                kept = directives.len(),
                "auto-discovery answer partially parsed"
            );
        }

        Ok(directives)
    }
}
