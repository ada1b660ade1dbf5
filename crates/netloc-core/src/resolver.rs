// ── Proxy resolution ──
//
// Turns a profile's `ProxySpec` into the `ResolvedProxy` that setters and
// the shell formatter consume. Static specs resolve locally; discovery
// specs go through the directive parser and take the first directive.
//
// Discovery failure is an error, never a silent `kind = None`: disabling
// the proxy because the script host was briefly unreachable would send
// internal traffic straight out.

use indexmap::IndexSet;
use tracing::debug;
use url::Url;

use crate::error::CoreError;
use crate::model::{LocationSet, ProxyDirective, ProxySpec, ResolvedProxy};
use crate::pac::DirectiveParser;

/// Always bypassed, ahead of any configured entry.
pub const LOOPBACK_BYPASS: &[&str] = &["localhost", "127.0.0.1", "::1", "*.local", "169.254/16"];

/// Build the bypass list: loopback, every profile's search domains, then
/// the operator's extra entries.
pub fn build_no_proxy(locations: &LocationSet, extra: &[String]) -> IndexSet<String> {
    LOOPBACK_BYPASS
        .iter()
        .map(|s| (*s).to_owned())
        .chain(locations.all_domains())
        .chain(
            extra
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
        )
        .collect()
}

#[derive(Clone)]
pub struct ProxyResolver {
    parser: DirectiveParser,
    no_proxy: IndexSet<String>,
}

impl ProxyResolver {
    pub fn new(parser: DirectiveParser, no_proxy: IndexSet<String>) -> Self {
        Self { parser, no_proxy }
    }

    pub fn no_proxy(&self) -> &IndexSet<String> {
        &self.no_proxy
    }

    /// Resolve `spec` for `target`.
    pub async fn resolve(&self, spec: &ProxySpec, target: &Url) -> Result<ResolvedProxy, CoreError> {
        match spec {
            ProxySpec::Empty => Ok(ResolvedProxy::none()),
            ProxySpec::Static(endpoint) => Ok(ResolvedProxy::from_endpoint(
                endpoint.clone(),
                self.no_proxy.clone(),
            )),
            ProxySpec::AutoDiscovery { url } => {
                let directives = self.parser.parse(url, target).await?;
                // Alternatives are not probed: the first directive is authoritative.
                let first = directives.first().ok_or_else(|| CoreError::ProxyDiscoveryUnavailable {
                    url: url.to_string(),
                    reason: "no directives".into(),
                })?;
                debug!(directive = ?first, alternatives = directives.len() - 1, "using first directive");

                Ok(match first {
                    ProxyDirective::Direct => ResolvedProxy::none(),
                    other => other.endpoint().map_or_else(ResolvedProxy::none, |endpoint| {
                        ResolvedProxy::from_endpoint(endpoint, self.no_proxy.clone())
                    }),
                })
            }
        }
    }
}
