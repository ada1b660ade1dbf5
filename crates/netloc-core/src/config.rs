// ── Runtime watcher configuration ──
//
// These types describe *how* the settle pipeline behaves: debounce
// window, collaborator timeouts, and which shell rc files to maintain.
// They never touch disk. The CLI builds a `WatcherConfig` from the
// config file and hands it in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::shell::ShellKind;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// An rc file to keep in sync and the shell that reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTarget {
    pub kind: ShellKind,
    pub rc_file: PathBuf,
}

impl ShellTarget {
    pub fn new(kind: ShellKind, home: &Path) -> Self {
        Self {
            kind,
            rc_file: kind.rc_file(home),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellSettings {
    pub enabled: bool,
    pub targets: Vec<ShellTarget>,
}

/// Tuning for the settle pipeline.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period that must elapse after the last change event.
    pub debounce: Duration,
    /// Upper bound for each individual system query.
    pub query_timeout: Duration,
    /// Upper bound for fetching an auto-discovery script.
    pub discovery_timeout: Duration,
    /// Target URL the routing function is asked about.
    pub probe_url: Url,
    /// Extra `no_proxy` entries beyond loopback and profile domains.
    pub proxy_bypass: Vec<String>,
    pub shell: ShellSettings,
}

impl WatcherConfig {
    pub fn new(probe_url: Url) -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            probe_url,
            proxy_bypass: Vec::new(),
            shell: ShellSettings::default(),
        }
    }
}
