//! Polling watchers that turn "fetch current state" into change events.
//!
//! Each watcher owns a background task with this life cycle:
//!
//! `Idle -> Polling -> {EmittingEvent -> Polling | Canceled -> Stopped}`
//!
//! The task stops on the caller's abort signal or when the [`WatchStream`]
//! is dropped. Fetches still in flight at that point are dropped (which
//! aborts the HTTP request) and their results are never emitted.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::types::Trace;
use crate::abort::{AbortHandle, AbortSignal};
use crate::client::Client;
use crate::errors::OpperError;

/// Number of most recent traces fetched per list-watch tick.
pub const WATCH_LIST_LIMIT: usize = 10;

/// Polling parameters.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub interval: Duration,
    pub list_limit: usize,
    pub buffer_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            list_limit: WATCH_LIST_LIMIT,
            buffer_capacity: 32,
        }
    }
}

impl WatchConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Change notification emitted by a watcher.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    /// A trace not seen before (list watch).
    NewItem(Trace),
    /// The watched trace's span count changed (single-trace watch).
    Updated(Trace),
    /// A fetch failed; polling continues on the next tick.
    FetchError(OpperError),
}

/// Observable state of a watch task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Polling,
    EmittingEvent,
    Canceled,
    Stopped,
}

/// Consumer side of a watcher.
pub struct WatchStream {
    rx: mpsc::Receiver<WatchEvent>,
    state_rx: watch::Receiver<WatchState>,
    drop_handle: AbortHandle,
}

impl WatchStream {
    /// Waits for the next event; `None` once the watcher has stopped.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    pub fn state(&self) -> WatchState {
        *self.state_rx.borrow()
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.drop_handle.abort();
    }
}

/// Seen-set for a single list-watch session.
#[derive(Debug, Default)]
struct ListSession {
    seen: HashSet<String>,
}

impl ListSession {
    /// Returns the unseen traces of one batch in chronological order and
    /// marks them as seen. `batch` is newest first, as the API returns it.
    fn take_new(&mut self, batch: Vec<Trace>) -> Vec<Trace> {
        batch
            .into_iter()
            .rev()
            .filter(|trace| self.seen.insert(trace.uuid.clone()))
            .collect()
    }
}

/// Span-count change detector for a single-trace watch.
///
/// Only the number of spans is compared, so a span whose score or output is
/// filled in later is not reported until another span is added.
#[derive(Debug)]
struct TraceSession {
    last_span_count: usize,
}

impl TraceSession {
    fn observe(&mut self, trace: &Trace) -> bool {
        if trace.spans.len() == self.last_span_count {
            return false;
        }
        self.last_span_count = trace.spans.len();
        true
    }
}

struct Emitter {
    tx: mpsc::Sender<WatchEvent>,
    state_tx: watch::Sender<WatchState>,
    external: AbortSignal,
    internal: AbortSignal,
}

impl Emitter {
    fn set_state(&self, state: WatchState) {
        self.state_tx.send_replace(state);
    }

    async fn cancelled(&mut self) {
        either_aborted(&mut self.external, &mut self.internal).await;
    }

    /// Sends one event. Returns false if the watcher should stop.
    async fn emit(&mut self, event: WatchEvent) -> bool {
        self.set_state(WatchState::EmittingEvent);
        let Self {
            tx,
            external,
            internal,
            ..
        } = self;
        let sent = tokio::select! {
            biased;
            _ = either_aborted(external, internal) => false,
            sent = tx.send(event) => sent.is_ok(),
        };
        if sent {
            self.set_state(WatchState::Polling);
        }
        sent
    }

    fn stop(self) {
        self.set_state(WatchState::Canceled);
        self.set_state(WatchState::Stopped);
    }
}

async fn either_aborted(external: &mut AbortSignal, internal: &mut AbortSignal) {
    tokio::select! {
        _ = external.aborted() => {}
        _ = internal.aborted() => {}
    }
}

fn start(abort: &AbortHandle, config: &WatchConfig) -> (Emitter, WatchStream) {
    let (tx, rx) = mpsc::channel(config.buffer_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(WatchState::Idle);
    let drop_handle = AbortHandle::new();
    let emitter = Emitter {
        tx,
        state_tx,
        external: abort.signal(),
        internal: drop_handle.signal(),
    };
    let stream = WatchStream {
        rx,
        state_rx,
        drop_handle,
    };
    (emitter, stream)
}

fn ticker(interval: Duration) -> tokio::time::Interval {
    let interval = interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl Client {
    /// Polls the most recent traces and emits the ones not in `seen`.
    ///
    /// `seen` should hold whatever the caller already displayed. Within a
    /// batch, new traces are emitted oldest first.
    pub fn watch_traces(
        &self,
        seen: HashSet<String>,
        abort: &AbortHandle,
        config: WatchConfig,
    ) -> WatchStream {
        let (emitter, stream) = start(abort, &config);
        let client = self.clone();
        tokio::spawn(async move {
            let mut emitter = emitter;
            let mut session = ListSession { seen };
            let mut ticker = ticker(config.interval);
            'poll: loop {
                tokio::select! {
                    biased;
                    _ = emitter.cancelled() => break 'poll,
                    _ = ticker.tick() => {}
                }
                emitter.set_state(WatchState::Polling);
                let fetched = tokio::select! {
                    biased;
                    _ = emitter.cancelled() => break 'poll,
                    fetched = client.list_traces(config.list_limit) => fetched,
                };
                match fetched {
                    Ok(batch) => {
                        let fresh = session.take_new(batch);
                        debug!(new = fresh.len(), seen = session.seen.len(), "trace list polled");
                        for trace in fresh {
                            if !emitter.emit(WatchEvent::NewItem(trace)).await {
                                break 'poll;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "trace list poll failed");
                        if !emitter.emit(WatchEvent::FetchError(err)).await {
                            break 'poll;
                        }
                    }
                }
            }
            emitter.stop();
        });
        stream
    }

    /// Polls one trace and emits it whenever its span count differs from the
    /// last one observed (starting from `last_span_count`).
    pub fn watch_trace(
        &self,
        trace_id: impl Into<String>,
        last_span_count: usize,
        abort: &AbortHandle,
        config: WatchConfig,
    ) -> WatchStream {
        let (emitter, stream) = start(abort, &config);
        let client = self.clone();
        let trace_id = trace_id.into();
        tokio::spawn(async move {
            let mut emitter = emitter;
            let mut session = TraceSession { last_span_count };
            let mut ticker = ticker(config.interval);
            'poll: loop {
                tokio::select! {
                    biased;
                    _ = emitter.cancelled() => break 'poll,
                    _ = ticker.tick() => {}
                }
                emitter.set_state(WatchState::Polling);
                let fetched = tokio::select! {
                    biased;
                    _ = emitter.cancelled() => break 'poll,
                    fetched = client.get_trace(&trace_id) => fetched,
                };
                let event = match fetched {
                    Ok(trace) if session.observe(&trace) => {
                        debug!(trace_id = %trace_id, spans = trace.spans.len(), "trace changed");
                        WatchEvent::Updated(trace)
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(trace_id = %trace_id, error = %err, "trace poll failed");
                        WatchEvent::FetchError(err)
                    }
                };
                if !emitter.emit(event).await {
                    break 'poll;
                }
            }
            emitter.stop();
        });
        stream
    }
}
