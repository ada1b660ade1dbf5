// ── Polling change source ──
//
// Stands in for OS change notifications: every `interval` it digests
// `scutil --nwi` and the default-route interface, and reports a change
// cause whenever either digest moves. A tick arriving far later than
// scheduled means the machine slept, which is reported as a wake.
//
// The watcher only reports. Debouncing and settling are the
// coordinator's job.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use netloc_core::{ChangeCause, Coordinator};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::{CommandLine, Exec};
use crate::query::default_route_interface;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Ticks later than this many intervals are treated as a wake from sleep.
const WAKE_FACTOR: u32 = 4;

/// Receiver of change causes.
pub trait ChangeSink: Send + Sync + 'static {
    fn submit(&self, cause: ChangeCause);
}

impl ChangeSink for Coordinator {
    fn submit(&self, cause: ChangeCause) {
        Coordinator::submit(self, cause);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Digest {
    state: u64,
    route: Option<u64>,
}

pub struct PollingWatcher {
    exec: Arc<dyn Exec>,
    interval: Duration,
}

impl PollingWatcher {
    pub fn new(exec: Arc<dyn Exec>, interval: Duration) -> Self {
        Self { exec, interval }
    }

    async fn digest(&self) -> Option<Digest> {
        let nwi = match self.exec.run(&CommandLine::new("scutil").arg("--nwi")).await {
            Ok(out) => out,
            Err(e) => {
                debug!(error = %e, "network state unavailable, skipping poll");
                return None;
            }
        };
        let route = default_route_interface(self.exec.as_ref()).await.ok().flatten();

        Some(Digest {
            state: hash(&nwi),
            route: route.as_deref().map(hash),
        })
    }

    /// Run until `cancel` fires. The first successful poll only sets the
    /// baseline; the daemon triggers its own initial settle.
    pub fn spawn<S: ChangeSink>(self, sink: S, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Digest> = None;
            // Wall clock: the monotonic clock stops while the machine sleeps.
            let mut last_tick = SystemTime::now();

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = SystemTime::now();
                        let gap = now.duration_since(last_tick).unwrap_or_default();
                        last_tick = now;
                        if last.is_some() && gap > self.interval * WAKE_FACTOR {
                            info!(gap_secs = gap.as_secs(), "long gap between polls, assuming wake");
                            sink.submit(ChangeCause::Wake);
                        }

                        let Some(digest) = self.digest().await else { continue };
                        match last {
                            Some(prev) if prev.state != digest.state => {
                                debug!("network state changed");
                                sink.submit(ChangeCause::NetworkState);
                            }
                            Some(prev) if prev.route != digest.route => {
                                debug!("default route changed");
                                sink.submit(ChangeCause::Route);
                            }
                            _ => {}
                        }
                        last = Some(digest);
                    }
                }
            }
            debug!("watcher stopped");
        })
    }
}

fn hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::command::scripted::ScriptedExec;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<ChangeCause>>>);

    impl ChangeSink for Recorder {
        fn submit(&self, cause: ChangeCause) {
            self.0.lock().unwrap().push(cause);
        }
    }

    impl Recorder {
        fn causes(&self) -> Vec<ChangeCause> {
            self.0.lock().unwrap().clone()
        }
    }

    fn rig() -> (Arc<ScriptedExec>, Recorder, CancellationToken, JoinHandle<()>) {
        let exec = Arc::new(
            ScriptedExec::new()
                .with("scutil --nwi", Ok("IPv4 network interface information\n  en0 : flags : 0x5 (IPv4,DNS)\n"))
                .with("route -n get default", Ok("  interface: en0\n")),
        );
        let recorder = Recorder::default();
        let cancel = CancellationToken::new();
        let watcher = PollingWatcher::new(Arc::clone(&exec) as Arc<dyn Exec>, Duration::from_secs(3));
        let handle = watcher.spawn(recorder.clone(), cancel.clone());
        (exec, recorder, cancel, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn steady_network_reports_nothing() {
        let (_, recorder, cancel, handle) = rig();

        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(recorder.causes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn state_and_route_changes_are_reported_once() {
        let (exec, recorder, cancel, handle) = rig();
        tokio::time::sleep(Duration::from_secs(4)).await;

        exec.respond("scutil --nwi", Ok("IPv4 network interface information\n  en5 : flags : 0x5 (IPv4,DNS)\n"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(recorder.causes(), [ChangeCause::NetworkState]);

        exec.respond("route -n get default", Ok("  interface: utun3\n"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(recorder.causes(), [ChangeCause::NetworkState, ChangeCause::Route]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_polls_keep_the_baseline() {
        let (exec, recorder, cancel, handle) = rig();
        tokio::time::sleep(Duration::from_secs(4)).await;

        exec.respond("scutil --nwi", Err("scutil: failed"));
        tokio::time::sleep(Duration::from_secs(9)).await;
        exec.respond("scutil --nwi", Ok("IPv4 network interface information\n  en0 : flags : 0x5 (IPv4,DNS)\n"));
        tokio::time::sleep(Duration::from_secs(9)).await;

        cancel.cancel();
        handle.await.unwrap();
        assert!(recorder.causes().is_empty());
    }
}
