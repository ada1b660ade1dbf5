//! `netloc run`: the long-lived watcher.
//!
//! Wires the polling watcher into the coordinator, settles once at
//! startup, then logs every outcome until interrupted. Each settle runs
//! to completion before shutdown.

use std::sync::Arc;

use netloc_core::{Coordinator, SettleOutcome};
use netloc_system::{DEFAULT_POLL_INTERVAL, PollingWatcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::CliError;

pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let settler = ctx.settler()?;
    for ambiguity in settler.locations().ambiguities() {
        warn!("{ambiguity}");
    }

    let coordinator = Coordinator::spawn(settler, ctx.runtime.watcher.debounce);
    let mut outcomes = coordinator.outcomes();

    let cancel = CancellationToken::new();
    let watcher = PollingWatcher::new(Arc::clone(&ctx.exec), DEFAULT_POLL_INTERVAL)
        .spawn(coordinator.clone(), cancel.clone());

    info!(
        locations = ctx.runtime.locations.len(),
        debounce_secs = ctx.runtime.watcher.debounce.as_secs(),
        "watching for network changes"
    );
    coordinator.trigger_now();

    loop {
        tokio::select! {
            biased;
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "could not listen for interrupt, stopping");
                }
                break;
            }
            changed = outcomes.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = outcomes.borrow_and_update().clone();
                if let Some(outcome) = latest {
                    log_outcome(&outcome);
                }
            }
        }
    }

    info!("shutting down");
    cancel.cancel();
    let _ = watcher.await;
    coordinator.shutdown().await;
    Ok(())
}

fn log_outcome(outcome: &SettleOutcome) {
    let failed = outcome.failure_count();
    if failed == 0 {
        debug!(sequence = outcome.sequence, "outcome published");
    } else {
        warn!(
            sequence = outcome.sequence,
            location = %outcome.evaluation.location.name,
            failed,
            "settle left settings unapplied, retrying on the next change"
        );
    }
}
