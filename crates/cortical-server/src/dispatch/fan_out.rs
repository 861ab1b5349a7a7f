//! Broadcast one inbound stream to `n` independently-paced outputs.

use cortical_core::Message;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, trace};

/// Spawn the fan-out relay.
///
/// Every message read from `input` is cloned onto each of the `n` returned
/// receivers, in arrival order. Each output buffers at most `lag` messages
/// (`0` is treated as `1`); a full output holds up delivery to all of them.
/// Outputs whose receiver was dropped are skipped from then on. When `input`
/// closes, every output closes.
///
/// With `n == 0` the relay still drains `input` so senders never stall.
pub fn fan_out(
    mut input: mpsc::Receiver<Message>,
    n: usize,
    lag: usize,
) -> (Vec<mpsc::Receiver<Message>>, JoinHandle<()>) {
    let lag = lag.max(1);
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..n).map(|_| mpsc::channel(lag)).unzip();

    let handle = tokio::spawn(async move {
        let mut outputs: Vec<Option<mpsc::Sender<Message>>> =
            senders.into_iter().map(Some).collect();
        let mut relayed: u64 = 0;

        while let Some(msg) = input.recv().await {
            for (index, slot) in outputs.iter_mut().enumerate() {
                let Some(tx) = slot else { continue };
                if tx.send(msg.clone()).await.is_err() {
                    trace!(output = index, "fan-out output dropped, skipping");
                    *slot = None;
                }
            }
            relayed += 1;
        }

        debug!(relayed, outputs = n, "fan-out input closed");
        // dropping `outputs` closes every receiver
    }
    .in_current_span());

    (receivers, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn collect(mut rx: mpsc::Receiver<Message>) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            out.push(msg);
        }
        out
    }

    fn msgs(texts: &[&'static str]) -> Vec<Message> {
        texts.iter().map(|t| Message::from(*t)).collect()
    }

    #[tokio::test]
    async fn every_output_sees_every_message_in_order() {
        let (tx, rx) = mpsc::channel(1);
        let (outputs, handle) = fan_out(rx, 3, 1);
        assert_eq!(outputs.len(), 3);

        let readers: Vec<_> = outputs.into_iter().map(|o| tokio::spawn(collect(o))).collect();
        for m in msgs(&["a", "b", "c", "d"]) {
            tx.send(m).await.unwrap();
        }
        drop(tx);

        for reader in readers {
            assert_eq!(reader.await.unwrap(), msgs(&["a", "b", "c", "d"]));
        }
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn closing_input_closes_all_outputs() {
        let (tx, rx) = mpsc::channel(1);
        let (mut outputs, handle) = fan_out(rx, 2, 4);
        drop(tx);
        handle.await.unwrap();
        for out in &mut outputs {
            assert!(out.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn zero_lag_is_clamped() {
        let (tx, rx) = mpsc::channel(1);
        let (mut outputs, _handle) = fan_out(rx, 1, 0);
        tx.send(Message::from("x")).await.unwrap();
        let got = timeout(Duration::from_secs(1), outputs[0].recv()).await.unwrap();
        assert_eq!(got, Some(Message::from("x")));
    }

    #[tokio::test]
    async fn zero_outputs_still_drains_input() {
        let (tx, rx) = mpsc::channel(1);
        let (outputs, handle) = fan_out(rx, 0, 1);
        assert!(outputs.is_empty());
        for m in msgs(&["a", "b", "c"]) {
            timeout(Duration::from_secs(1), tx.send(m)).await.unwrap().unwrap();
        }
        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_output_does_not_block_the_rest() {
        let (tx, rx) = mpsc::channel(1);
        let (mut outputs, handle) = fan_out(rx, 2, 1);
        let dead = outputs.remove(1);
        drop(dead);
        let reader = tokio::spawn(collect(outputs.remove(0)));

        for m in msgs(&["1", "2", "3", "4", "5"]) {
            timeout(Duration::from_secs(1), tx.send(m)).await.unwrap().unwrap();
        }
        drop(tx);

        assert_eq!(reader.await.unwrap(), msgs(&["1", "2", "3", "4", "5"]));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn slow_output_holds_up_intake() {
        let (tx, rx) = mpsc::channel(1);
        let (mut outputs, _handle) = fan_out(rx, 2, 1);

        // Output 1 is never read. With lag 1 it absorbs one message, the
        // relay blocks on the second, and the input buffer fills behind it.
        for m in msgs(&["a", "b", "c"]) {
            timeout(Duration::from_secs(1), tx.send(m)).await.unwrap().unwrap();
        }
        let blocked = timeout(Duration::from_millis(100), tx.send(Message::from("d"))).await;
        assert!(blocked.is_err(), "intake should stall behind the slow output");

        // Output 0 got at most lag + 1 ahead of output 1.
        assert_eq!(outputs[0].recv().await, Some(Message::from("a")));
        assert_eq!(outputs[0].recv().await, Some(Message::from("b")));
        assert!(outputs[0].try_recv().is_err());

        // Draining the slow output releases everyone.
        assert_eq!(outputs[1].recv().await, Some(Message::from("a")));
        assert_eq!(outputs[1].recv().await, Some(Message::from("b")));
        assert_eq!(outputs[0].recv().await, Some(Message::from("c")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn fan_out_fidelity(
            payloads in prop::collection::vec("[a-z]{0,8}", 0..40),
            n in 1usize..5,
            lag in 0usize..4,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async move {
                let expected: Vec<Message> = payloads.iter().cloned().map(Message::from).collect();
                let (tx, rx) = mpsc::channel(1);
                let (outputs, handle) = fan_out(rx, n, lag);
                let readers: Vec<_> = outputs.into_iter().map(|o| tokio::spawn(collect(o))).collect();

                for m in expected.clone() {
                    tx.send(m).await.unwrap();
                }
                drop(tx);

                for reader in readers {
                    assert_eq!(reader.await.unwrap(), expected);
                }
                handle.await.unwrap();
            });
        }
    }
}
