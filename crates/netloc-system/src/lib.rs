//! macOS collaborators for netloc.
//!
//! Implements the `netloc-core` provider traits on top of the system's
//! command-line tools (`scutil`, `networksetup`, `ipconfig`, `route`,
//! `lpadmin`, `systemsetup`) and reqwest, plus a polling watcher that
//! feeds change causes to the coordinator.

pub mod command;
pub mod error;
pub mod fetch;
pub mod mutate;
pub mod parse;
pub mod query;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use netloc_core::Collaborators;

pub use command::{CommandLine, Exec, ProcessRunner};
pub use error::SystemError;
pub use fetch::HttpScriptFetcher;
pub use mutate::MacSystemMutator;
pub use query::MacSystemQuery;
pub use watch::{ChangeSink, DEFAULT_POLL_INTERVAL, PollingWatcher};

/// Upper bound for any single system tool invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Wire the real providers together.
pub fn collaborators(exec: Arc<dyn Exec>, sudo: bool, fetch_timeout: Duration) -> Result<Collaborators, SystemError> {
    Ok(Collaborators {
        query: Arc::new(MacSystemQuery::new(Arc::clone(&exec))),
        mutator: Arc::new(MacSystemMutator::new(exec, sudo)),
        fetcher: Arc::new(HttpScriptFetcher::new(fetch_timeout)?),
    })
}
