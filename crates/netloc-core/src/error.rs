// ── Core error types ──
//
// Every condition the settle pipeline can run into. None of these are
// fatal to the daemon: each settle is a fresh attempt, so callers log
// the error where it is detected and carry on with whatever resolved.
// Collaborator crates translate their own failures into the query or
// mutation flavour at the trait boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Collaborator failures ────────────────────────────────────────
    #[error("System query '{query}' unavailable: {reason}")]
    QueryUnavailable { query: String, reason: String },

    #[error("Setting '{setting}' could not be applied: {reason}")]
    MutationFailed { setting: String, reason: String },

    // ── Proxy discovery ──────────────────────────────────────────────
    #[error("Proxy auto-discovery via {url} unavailable: {reason}")]
    ProxyDiscoveryUnavailable { url: String, reason: String },

    #[error("Malformed proxy directive '{token}': {reason}")]
    MalformedDirective { token: String, reason: String },

    #[error("Invalid proxy specification '{value}': {reason}")]
    InvalidProxySpec { value: String, reason: String },

    // ── Location configuration ───────────────────────────────────────
    #[error("Location '{profile}' has no match criteria and will match every network")]
    ConfigurationAmbiguous { profile: String },

    #[error("Invalid location list: {message}")]
    InvalidLocations { message: String },

    // ── Coordinator ──────────────────────────────────────────────────
    #[error("Settle coordinator is not running")]
    CoordinatorStopped,

    // ── Shell rc files ───────────────────────────────────────────────
    #[error("Cannot update shell file {}: {source}", path.display())]
    ShellFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Wrap a failure of a named system query.
    pub fn query(query: impl Into<String>, reason: impl ToString) -> Self {
        Self::QueryUnavailable {
            query: query.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a failure of a named system setting.
    pub fn mutation(setting: impl Into<String>, reason: impl ToString) -> Self {
        Self::MutationFailed {
            setting: setting.into(),
            reason: reason.to_string(),
        }
    }

    /// Discovery failures are the one class where the caller must keep
    /// the previous resolution instead of disabling the proxy.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Self::ProxyDiscoveryUnavailable { .. })
    }
}
