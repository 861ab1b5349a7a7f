//! Multiplex many producer streams into one output.

use cortical_core::Message;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, trace};

/// Spawn one relay per input, all writing to a single shared output.
///
/// Relays stop as soon as `done` is cancelled, even while blocked on a send.
/// The output closes exactly once, after every relay has exited: a closer task
/// owns the original sender and drops it only when the relay set is empty.
/// Aborting the returned handle aborts the relays with it.
///
/// No fairness between inputs; each input's own order is preserved.
pub fn merge(
    done: CancellationToken,
    inputs: Vec<mpsc::Receiver<Message>>,
) -> (mpsc::Receiver<Message>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);

    let handle = tokio::spawn(async move {
        let mut relays = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let _ = relays.spawn(relay(index, input, tx.clone(), done.clone()).in_current_span());
        }

        let count = relays.len();
        while relays.join_next().await.is_some() {}
        debug!(relays = count, "merge complete, closing output");
        drop(tx);
    }
    .in_current_span());

    (rx, handle)
}

async fn relay(
    index: usize,
    mut input: mpsc::Receiver<Message>,
    output: mpsc::Sender<Message>,
    done: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            () = done.cancelled() => break,
            msg = input.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        tokio::select! {
            biased;
            () = done.cancelled() => break,
            sent = output.send(msg) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    trace!(input = index, "merge relay exited");
}
