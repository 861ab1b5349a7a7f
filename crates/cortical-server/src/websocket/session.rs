//! Per-session dispatcher: wires cortexes to one upgraded connection.
//!
//! Lifecycle: `Idle → Upgrading → Active → Draining → Closed`.
//!
//! 1. Instantiates every configured cortex with the session
//! 2. Starts one worker per producer and per consumer, each with its own stop signal
//! 3. Connects inbound frames → fan-out → consumers, and producers → merge → outbound
//! 4. Waits for the connection adapter to raise "closed" (or for server shutdown)
//! 5. Raises `done`, fires every stop signal, and drains all tasks within `drain_timeout`

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::Message as WsMessage;
use cortical_core::{CortexFactory, Session, SessionId};
use futures::{Sink, Stream, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use super::connection::{ClosedSignal, CloseReason, LoopContext, read_loop, write_loop};
use crate::config::DispatchConfig;
use crate::dispatch::{StopSignal, fan_out, merge, spawn_consumer, spawn_producer};
use crate::metrics::{
    CORTEX_INSTANCES_TOTAL, SESSION_ABORTED_TASKS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::shutdown::drain_tasks;

/// Where a session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Request received, nothing started.
    Idle,
    /// Protocol upgrade in progress.
    Upgrading,
    /// Workers and connection loops running.
    Active,
    /// "closed" observed; stop signals fired, tasks draining.
    Draining,
    /// Terminal. The connection is released.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Upgrading => "upgrading",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        })
    }
}

/// A fresh state channel starting at [`SessionState::Idle`].
pub fn state_channel() -> (watch::Sender<SessionState>, watch::Receiver<SessionState>) {
    watch::channel(SessionState::Idle)
}

/// Publish a state transition and log it.
pub fn transition(state: &watch::Sender<SessionState>, next: SessionState) {
    let prev = state.send_replace(next);
    debug!(from = %prev, to = %next, "session state");
}

/// Summary of one finished session.
#[derive(Clone, Debug)]
pub struct SessionReport {
    /// The session's identifier.
    pub session_id: SessionId,
    /// What ended the session.
    pub reason: CloseReason,
    /// Producer workers started.
    pub producers: usize,
    /// Consumer workers started.
    pub consumers: usize,
    /// Total stop-signal firings; equals `producers + consumers` on every teardown.
    pub stop_signals_fired: usize,
    /// Tasks still running at the end of the drain timeout.
    pub aborted_tasks: usize,
    /// Time spent `Active` plus `Draining`.
    pub duration: Duration,
}

/// A cortex factory with the name it was registered under.
#[derive(Clone)]
pub struct NamedCortex {
    /// Registry name, used in logs and metric labels.
    pub name: String,
    /// Builds the cortex for each session.
    pub factory: CortexFactory,
}

impl fmt::Debug for NamedCortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedCortex").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Runs sessions against a fixed set of cortexes.
///
/// Cheap to clone; clones share the active session counter and the set of
/// running sessions.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    cortexes: Arc<Vec<NamedCortex>>,
    config: DispatchConfig,
    shutdown: CancellationToken,
    active: Arc<AtomicUsize>,
    sessions: TaskTracker,
}

impl Dispatcher {
    /// A dispatcher with no cortexes.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            cortexes: Arc::new(Vec::new()),
            config,
            shutdown: CancellationToken::new(),
            active: Arc::new(AtomicUsize::new(0)),
            sessions: TaskTracker::new(),
        }
    }

    /// Register a cortex. Cortexes are instantiated in registration order.
    #[must_use]
    pub fn with_cortex(mut self, name: impl Into<String>, factory: CortexFactory) -> Self {
        Arc::make_mut(&mut self.cortexes).push(NamedCortex {
            name: name.into(),
            factory,
        });
        self
    }

    /// End every running session when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Registered cortex names, in order.
    pub fn cortex_names(&self) -> Vec<&str> {
        self.cortexes.iter().map(|c| c.name.as_str()).collect()
    }

    /// Dispatch settings.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Sessions currently between `Active` and `Closed`.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Wait for every running session to finish teardown.
    ///
    /// Sessions started afterwards are still waited for. Returns `false` if
    /// some session was still running after `timeout`.
    pub async fn wait_for_sessions(&self, timeout: Duration) -> bool {
        self.sessions.close();
        let idle = tokio::time::timeout(timeout, self.sessions.wait()).await.is_ok();
        if !idle {
            warn!(active = self.active_sessions(), "sessions still running at exit");
        }
        idle
    }

    /// Serve one upgraded connection until it closes.
    pub async fn run<S>(&self, socket: S, session: Session) -> SessionReport
    where
        S: Stream<Item = Result<WsMessage, axum::Error>>
            + Sink<WsMessage, Error = axum::Error>
            + Send
            + 'static,
    {
        let (state, _) = state_channel();
        self.run_observed(socket, session, state).await
    }

    /// Like [`run`](Self::run), publishing each state transition on `state`.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn run_observed<S>(
        &self,
        socket: S,
        session: Session,
        state: watch::Sender<SessionState>,
    ) -> SessionReport
    where
        S: Stream<Item = Result<WsMessage, axum::Error>>
            + Sink<WsMessage, Error = axum::Error>
            + Send
            + 'static,
    {
        let _running = self.sessions.token();
        let started = Instant::now();
        let _ = self.active.fetch_add(1, Ordering::Relaxed);
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        transition(&state, SessionState::Active);

        let mut producers = Vec::new();
        let mut consumers = Vec::new();
        for named in self.cortexes.iter() {
            let cortex = (named.factory)(&session);
            counter!(CORTEX_INSTANCES_TOTAL, "cortex" => named.name.clone()).increment(1);
            if cortex.is_empty() {
                debug!(cortex = %named.name, "cortex has no producer or consumer");
                continue;
            }
            if let Some(produce) = cortex.producer {
                producers.push((named.name.as_str(), produce));
            }
            if let Some(consume) = cortex.consumer {
                consumers.push((named.name.as_str(), consume));
            }
        }
        let producer_count = producers.len();
        let consumer_count = consumers.len();
        info!(
            remote_addr = ?session.remote_addr(),
            producers = producer_count,
            consumers = consumer_count,
            "session started"
        );

        let mut stops = Vec::with_capacity(producer_count + consumer_count);
        let mut tasks = Vec::with_capacity(producer_count + consumer_count + 4);

        // inbound → fan-out → consumers
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_capacity.max(1));
        let (fan_outputs, fan_task) = fan_out(inbound_rx, consumer_count, self.config.fanout_lag);
        tasks.push(fan_task);
        for ((name, consume), input) in consumers.into_iter().zip(fan_outputs) {
            let stop = StopSignal::new();
            tasks.push(spawn_consumer(name, session.clone(), consume, input, stop.clone()));
            stops.push(stop);
        }

        // producers → merge → outbound
        let mut producer_outputs = Vec::with_capacity(producer_count);
        for (name, produce) in producers {
            let (tx, rx) = mpsc::channel(self.config.worker_capacity.max(1));
            let stop = StopSignal::new();
            tasks.push(spawn_producer(name, session.clone(), produce, tx, stop.clone()));
            stops.push(stop);
            producer_outputs.push(rx);
        }
        let done = CancellationToken::new();
        let (outbound_rx, merge_task) = merge(done.clone(), producer_outputs);
        tasks.push(merge_task);

        // connection adapter
        let ctx = LoopContext {
            closed: Arc::new(ClosedSignal::new()),
            shutdown: CancellationToken::new(),
            max_consecutive_errors: self.config.max_consecutive_errors,
        };
        let (control_tx, control_rx) = mpsc::channel(self.config.control_capacity.max(1));
        let (sink, stream) = socket.split();
        tasks.push(tokio::spawn(
            write_loop(sink, outbound_rx, control_rx, ctx.clone()).instrument(Span::current()),
        ));
        tasks.push(tokio::spawn(
            read_loop(stream, inbound_tx, control_tx, ctx.clone()).instrument(Span::current()),
        ));

        let reason = tokio::select! {
            reason = ctx.closed.closed() => reason,
            () = self.shutdown.cancelled() => {
                let _ = ctx.closed.signal(CloseReason::ServerShutdown);
                ctx.closed.closed().await
            }
        };

        transition(&state, SessionState::Draining);
        done.cancel();
        for stop in &stops {
            stop.fire();
        }
        ctx.shutdown.cancel();

        let aborted = drain_tasks(tasks, self.config.drain_timeout).await;
        if aborted > 0 {
            warn!(aborted, "tasks still running after drain timeout were aborted");
            counter!(SESSION_ABORTED_TASKS_TOTAL).increment(u64::try_from(aborted).unwrap_or(u64::MAX));
        }

        let duration = started.elapsed();
        let _ = self.active.fetch_sub(1, Ordering::Relaxed);
        counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(WS_CONNECTION_DURATION_SECONDS).record(duration.as_secs_f64());
        transition(&state, SessionState::Closed);

        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        if reason.is_failure() {
            warn!(%reason, duration_ms, "session ended");
        } else {
            info!(%reason, duration_ms, "session ended");
        }

        SessionReport {
            session_id: session.id().clone(),
            reason,
            producers: producer_count,
            consumers: consumer_count,
            stop_signals_fired: stops.iter().map(StopSignal::fire_count).sum(),
            aborted_tasks: aborted,
            duration,
        }
    }
}
