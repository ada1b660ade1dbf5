// ── Debounce coordinator ──
//
// Turns a bursty stream of "something changed" notifications into one
// settle per quiet period. A single worker task owns the `Settler`, the
// debounce timer, and the trigger queue, so settles are strictly
// serialized: a trigger that arrives mid-settle waits in the queue and
// is handled once the settle returns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::settle::{SettleOutcome, SettleTrigger, Settler};

/// Why the event source thinks the network changed. Informational only;
/// every settle re-derives the truth from a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCause {
    NetworkState,
    Interface(String),
    Route,
    Wake,
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkState => f.write_str("network state changed"),
            Self::Interface(name) => write!(f, "interface {name} changed"),
            Self::Route => f.write_str("default route changed"),
            Self::Wake => f.write_str("host woke from sleep"),
        }
    }
}

// ── Debounce timer ───────────────────────────────────────────────────

/// Explicit start/reset/fire lifecycle for the quiet-period timer.
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)start the window from `now`, discarding any pending deadline.
    pub fn reset(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether the window has elapsed at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Disarm after firing. Returns whether the timer was armed.
    pub fn fire(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

enum Trigger {
    Change(ChangeCause),
    SettleNow(Option<oneshot::Sender<Arc<SettleOutcome>>>),
}

/// Handle to the settle worker. Cheap to clone; every clone feeds the
/// same queue.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    trigger_tx: mpsc::UnboundedSender<Trigger>,
    outcome: watch::Sender<Option<Arc<SettleOutcome>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Start the worker on the current runtime.
    pub fn spawn(settler: Settler, debounce: Duration) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (outcome, _) = watch::channel(None);
        let cancel = CancellationToken::new();

        let worker = Worker {
            settler,
            timer: DebounceTimer::new(debounce),
            outcome: outcome.clone(),
        };
        let task = tokio::spawn(worker.run(trigger_rx, cancel.clone()));

        Self {
            inner: Arc::new(CoordinatorInner {
                trigger_tx,
                outcome,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Report a raw change. Never blocks; restarts the quiet period.
    pub fn submit(&self, cause: ChangeCause) {
        if self.inner.trigger_tx.send(Trigger::Change(cause)).is_err() {
            debug!("coordinator stopped, change dropped");
        }
    }

    /// Queue an immediate settle without waiting for it.
    pub fn trigger_now(&self) {
        if self.inner.trigger_tx.send(Trigger::SettleNow(None)).is_err() {
            debug!("coordinator stopped, manual trigger dropped");
        }
    }

    /// Queue an immediate settle and wait for its outcome. Runs after
    /// any settle already in flight.
    pub async fn settle_now(&self) -> Result<Arc<SettleOutcome>, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .trigger_tx
            .send(Trigger::SettleNow(Some(tx)))
            .map_err(|_| CoreError::CoordinatorStopped)?;
        rx.await.map_err(|_| CoreError::CoordinatorStopped)
    }

    /// Subscribe to settle outcomes.
    pub fn outcomes(&self) -> watch::Receiver<Option<Arc<SettleOutcome>>> {
        self.inner.outcome.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<SettleOutcome>> {
        self.inner.outcome.borrow().clone()
    }

    /// Stop the worker and wait for it. An in-flight settle finishes first.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

// ── Worker ───────────────────────────────────────────────────────────

struct Worker {
    settler: Settler,
    timer: DebounceTimer,
    outcome: watch::Sender<Option<Arc<SettleOutcome>>>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Trigger>, cancel: CancellationToken) {
        loop {
            let deadline = self.timer.deadline();

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                trigger = rx.recv() => {
                    let Some(trigger) = trigger else { break };
                    self.handle(trigger).await;
                }
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.timer.fire();
                    self.settle(SettleTrigger::Debounced).await;
                }
            }
        }
        debug!("settle worker stopped");
    }

    async fn handle(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Change(cause) => {
                if self.timer.is_armed() {
                    debug!(%cause, "change during quiet period, restarting debounce");
                } else {
                    info!(%cause, "network change detected");
                }
                self.timer.reset(Instant::now());
            }
            Trigger::SettleNow(reply) => {
                let outcome = self.settle(SettleTrigger::Manual).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    async fn settle(&mut self, trigger: SettleTrigger) -> Arc<SettleOutcome> {
        let outcome = Arc::new(self.settler.settle(trigger).await);
        self.outcome.send_replace(Some(Arc::clone(&outcome)));
        outcome
    }
}
