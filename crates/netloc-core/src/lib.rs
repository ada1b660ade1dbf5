//! Decision layer for netloc.
//!
//! Sits between noisy network-change notifications and the host settings
//! they should eventually produce:
//!
//! - **[`Coordinator`]**: debounces raw change events and runs exactly
//!   one settle per quiet period on a single worker, so settles never
//!   overlap. Manual triggers skip the quiet period but still queue.
//!
//! - **[`Settler`]**: runs one settle, [`SnapshotBuilder`] capture (consulting
//!   the [`StateCache`]), [`match_location`], [`ProxyResolver`], then the
//!   [`ApplyPlan`] pushed through the [`SystemMutator`] and the shell rc
//!   files.
//!
//! - **[`pac`]**: fetches auto-discovery scripts (always bypassing any
//!   proxy) and turns their routing answer into [`ProxyDirective`]s.
//!
//! - **[`shell`]**: renders a [`ResolvedProxy`] for POSIX, C shell, and
//!   fish, and keeps one marker-delimited block per rc file.
//!
//! Everything the layer needs from the OS or network arrives through the
//! traits in [`provider`]; this crate spawns no processes and opens no
//! sockets.

pub mod cache;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod matcher;
pub mod model;
pub mod pac;
pub mod plan;
pub mod provider;
pub mod resolver;
pub mod settle;
pub mod shell;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheEntry, StateCache};
pub use capture::{Capture, SnapshotBuilder};
pub use config::{ShellSettings, ShellTarget, WatcherConfig};
pub use coordinator::{ChangeCause, Coordinator, DebounceTimer};
pub use error::CoreError;
pub use matcher::match_location;
pub use model::{
    Fingerprint, LocationProfile, LocationSet, NetworkSnapshot, ProxyDirective, ProxyEndpoint,
    ProxyKind, ProxySpec, ResolvedProxy,
};
pub use plan::ApplyPlan;
pub use provider::{ProxyRoute, ScriptFetcher, SystemMutator, SystemProxy, SystemQuery};
pub use resolver::ProxyResolver;
pub use settle::{
    Collaborators, Evaluation, ProxyOutcome, SettingResult, SettleOutcome, SettleTrigger,
    Settler, ShellResult,
};
pub use shell::{ShellChange, ShellDialect, ShellKind};
