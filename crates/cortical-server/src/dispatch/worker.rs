//! Producer and consumer workers, each paired with its own stop signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use cortical_core::{ConsumeFn, Message, ProduceFn, Session};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span};

/// Per-worker stop signal.
///
/// Firing is idempotent and never blocks, whether or not the worker is still
/// listening. The fire count is kept so teardown can be audited.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    token: CancellationToken,
    fired: Arc<AtomicUsize>,
}

impl StopSignal {
    /// Create an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal.
    pub fn fire(&self) {
        let _ = self.fired.fetch_add(1, Ordering::Relaxed);
        self.token.cancel();
    }

    /// Whether the signal has been fired at least once.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// How many times [`fire`](Self::fire) was called.
    pub fn fire_count(&self) -> usize {
        self.fired.load(Ordering::Relaxed)
    }

    /// Resolves once the signal is fired.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}

/// Spawn a producer worker.
///
/// Invokes `produce` repeatedly and offers each result on `output`. Both the
/// invocation and the offer are raced against `stop`. The worker exits when
/// `stop` fires, when the producer returns `None`, or when `output` is closed.
pub fn spawn_producer(
    name: &str,
    session: Session,
    produce: ProduceFn,
    output: mpsc::Sender<Message>,
    stop: StopSignal,
) -> JoinHandle<()> {
    let span = debug_span!("producer", cortex = %name);
    tokio::spawn(
        async move {
            let mut produced: u64 = 0;
            loop {
                let next = tokio::select! {
                    biased;
                    () = stop.fired() => break,
                    next = produce(session.clone()) => next,
                };
                let Some(msg) = next else {
                    debug!(produced, "producer exhausted");
                    return;
                };
                tokio::select! {
                    biased;
                    () = stop.fired() => break,
                    sent = output.send(msg) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                produced += 1;
            }
            debug!(produced, "producer stopped");
        }
        .instrument(span),
    )
}

/// Spawn a consumer worker.
///
/// Hands every message from `input` to `consume`, one at a time. Exits when
/// `stop` fires (pending messages are not drained) or when `input` closes.
pub fn spawn_consumer(
    name: &str,
    session: Session,
    consume: ConsumeFn,
    mut input: mpsc::Receiver<Message>,
    stop: StopSignal,
) -> JoinHandle<()> {
    let span = debug_span!("consumer", cortex = %name);
    tokio::spawn(
        async move {
            let mut consumed: u64 = 0;
            loop {
                let msg = tokio::select! {
                    biased;
                    () = stop.fired() => break,
                    msg = input.recv() => msg,
                };
                let Some(msg) = msg else { break };
                consume(session.clone(), msg).await;
                consumed += 1;
            }
            debug!(consumed, "consumer stopped");
        }
        .instrument(span),
    )
}
