use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::engine::{RefreshEngine, RefreshError};
use crate::session::DeviceSession;
use crate::snapshot::{BridgeState, Snapshot};

#[derive(Debug)]
pub enum RefreshOutcome {
    Completed(Result<Arc<Snapshot>, RefreshError>),
    /// Another refresh was already in flight; this trigger did nothing.
    Skipped,
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Completed(Ok(_)))
    }
}

/// Schedules refreshes for one engine and never lets two of them overlap.
pub struct Coordinator<S: DeviceSession> {
    engine: Arc<Mutex<RefreshEngine<S>>>,
    state: watch::Receiver<BridgeState>,
    base_interval: Duration,
    backoff_max: Duration,
    failures_in_row: AtomicU32,
    skipped: AtomicU64,
}

impl<S: DeviceSession> Coordinator<S> {
    pub fn new(engine: RefreshEngine<S>) -> Self {
        let state = engine.subscribe();
        let base_interval = engine.config().update_interval;
        let backoff_max = engine.config().backoff_max.max(base_interval);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            state,
            base_interval,
            backoff_max,
            failures_in_row: AtomicU32::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BridgeState> {
        self.state.clone()
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Base interval, doubled for each consecutive failed cycle up to the cap.
    pub fn effective_interval(&self) -> Duration {
        let failures = self.failures_in_row.load(Ordering::Relaxed).min(16);
        self.base_interval
            .saturating_mul(1_u32 << failures)
            .min(self.backoff_max)
    }

    pub async fn request_refresh(&self) -> RefreshOutcome {
        let Ok(mut engine) = self.engine.try_lock() else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("refresh already in flight, ignoring trigger");
            return RefreshOutcome::Skipped;
        };

        let result = engine.refresh().await;
        drop(engine);

        if result.is_ok() {
            self.failures_in_row.store(0, Ordering::Relaxed);
        } else {
            self.failures_in_row.fetch_add(1, Ordering::Relaxed);
        }
        RefreshOutcome::Completed(result)
    }

    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        self.run_with(shutdown, |_, _| {}).await;
    }

    /// Refreshes immediately, then once per effective interval until
    /// `shutdown` resolves. `on_cycle` sees every outcome with the state it
    /// produced.
    pub async fn run_with<F>(&self, shutdown: impl Future<Output = ()>, mut on_cycle: F)
    where
        F: FnMut(&RefreshOutcome, &BridgeState),
    {
        tokio::pin!(shutdown);
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("coordinator stopping");
                    break;
                }
                _ = sleep(delay) => {
                    let outcome = self.request_refresh().await;
                    let state = self.state();
                    on_cycle(&outcome, &state);
                    delay = self.effective_interval();
                    info!(
                        next_ms = %delay.as_millis(),
                        success = outcome.is_success(),
                        available = state.available(),
                        "tick"
                    );
                }
            }
        }
    }
}
