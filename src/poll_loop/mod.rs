//! PollLoop - One Stream's Cadence
//!
//! ## Responsibilities
//!
//! - Recurring fetch dispatch at a fixed period, first tick immediate
//! - At most one in-flight request per loop (skip-if-busy, never queued)
//! - Idempotent start/stop, supersession of late in-flight results
//! - Out-of-band refresh through the same busy guard
//!
//! A loop owns only cadence and the in-flight discipline. What to fetch
//! and how a resolved result is applied to the view state are injected by
//! the SessionController, so the loop stays testable with stub closures.

use crate::backend_client::StreamPayload;
use crate::error::Result;
use crate::models::{ContextTag, StreamId};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Result of one fetch dispatch, tagged with the context at dispatch time
#[derive(Debug)]
pub struct TickOutcome {
    pub stream: StreamId,
    pub tag: ContextTag,
    pub payload: Result<StreamPayload>,
}

/// Produces one fetch future per tick, capturing the current context
pub type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, TickOutcome> + Send + Sync>;

/// Applies a resolved, non-superseded outcome to the view state
pub type ApplyFn = Arc<dyn Fn(TickOutcome) -> BoxFuture<'static, ()> + Send + Sync>;

/// Per-activation state shared between the ticker and in-flight tasks
///
/// Each `start()` gets a fresh activation, so a fetch left over from a
/// stopped activation can neither block nor be applied by the next one.
struct Activation {
    in_flight: AtomicBool,
    superseded: AtomicBool,
}

struct RunningLoop {
    ticker: JoinHandle<()>,
    activation: Arc<Activation>,
}

/// One stream's recurring-fetch driver
pub struct PollLoop {
    stream: StreamId,
    period: Duration,
    refresh: Arc<Notify>,
    state: Mutex<Option<RunningLoop>>,
}

impl PollLoop {
    /// Create a loop for `stream`, not yet ticking
    pub fn new(stream: StreamId, period: Duration) -> Self {
        Self {
            stream,
            period,
            refresh: Arc::new(Notify::new()),
            state: Mutex::new(None),
        }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking; the first fetch dispatches immediately
    ///
    /// Idempotent: starting a running loop keeps the existing timer and
    /// never arms a second one.
    pub async fn start(&self, fetch: FetchFn, apply: ApplyFn) {
        let mut state = self.state.lock().await;
        if state.is_some() {
            tracing::debug!(stream = %self.stream, "Poll loop already running, keeping existing timer");
            return;
        }

        let activation = Arc::new(Activation {
            in_flight: AtomicBool::new(false),
            superseded: AtomicBool::new(false),
        });

        let stream = self.stream;
        let period = self.period;
        let refresh = self.refresh.clone();
        let ticker_activation = activation.clone();

        let ticker = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = refresh.notified() => {}
                }
                Self::dispatch(stream, &ticker_activation, &fetch, &apply);
            }
        });

        *state = Some(RunningLoop { ticker, activation });
        tracing::debug!(
            stream = %self.stream,
            period_ms = self.period.as_millis() as u64,
            "Poll loop started"
        );
    }

    /// Stop ticking immediately
    ///
    /// An in-flight request is not aborted; its result is discarded when it
    /// resolves. Safe to call on a stopped loop.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if let Some(running) = state.take() {
            running.activation.superseded.store(true, Ordering::Release);
            running.ticker.abort();
            tracing::debug!(stream = %self.stream, "Poll loop stopped");
        }
    }

    /// `stop()` followed by `start()`
    pub async fn restart(&self, fetch: FetchFn, apply: ApplyFn) {
        self.stop().await;
        self.start(fetch, apply).await;
    }

    /// Trigger one immediate out-of-band tick
    ///
    /// Goes through the same skip-if-busy guard as a periodic tick and
    /// leaves the periodic schedule undisturbed.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    fn dispatch(stream: StreamId, activation: &Arc<Activation>, fetch: &FetchFn, apply: &ApplyFn) {
        if activation.in_flight.swap(true, Ordering::AcqRel) {
            tracing::trace!(stream = %stream, "Previous fetch still in flight, skipping tick");
            return;
        }

        let activation = activation.clone();
        let future = fetch();
        let apply = apply.clone();

        tokio::spawn(async move {
            let outcome = future.await;
            if activation.superseded.load(Ordering::Acquire) {
                tracing::trace!(stream = %stream, "Loop stopped while fetch in flight, discarding result");
            } else {
                apply(outcome).await;
            }
            activation.in_flight.store(false, Ordering::Release);
        });
    }
}
