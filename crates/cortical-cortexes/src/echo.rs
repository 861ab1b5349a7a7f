//! `echo`: every received message is sent straight back.

use std::sync::Arc;

use cortical_core::{Cortex, CortexFactory, Message, cortex};
use tokio::sync::{Mutex, mpsc};

/// Registry name.
pub const NAME: &str = "echo";

/// Messages held between the consumer and the producer.
const BUFFER: usize = 16;

/// Build the echo factory.
pub fn factory() -> CortexFactory {
    cortex::factory(|_session| {
        let (tx, rx) = mpsc::channel::<Message>(BUFFER);
        let rx = Arc::new(Mutex::new(rx));
        Cortex::new()
            .with_consumer(move |_session, msg| {
                let tx = tx.clone();
                async move {
                    // the producer is gone once the session is draining
                    let _ = tx.send(msg).await;
                }
            })
            .with_producer(move |_session| {
                let rx = rx.clone();
                async move { rx.lock().await.recv().await }
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortical_core::Session;

    #[tokio::test]
    async fn producer_returns_what_consumer_received() {
        let session = Session::new(None);
        let cortex = factory()(&session);
        let produce = cortex.producer.unwrap();
        let consume = cortex.consumer.unwrap();

        consume(session.clone(), Message::from("test")).await;
        consume(session.clone(), Message::from("again")).await;
        assert_eq!(produce(session.clone()).await, Some(Message::from("test")));
        assert_eq!(produce(session.clone()).await, Some(Message::from("again")));
    }

    #[tokio::test]
    async fn producer_ends_when_consumer_is_dropped() {
        let session = Session::new(None);
        let cortex = factory()(&session);
        let produce = cortex.producer.unwrap();
        drop(cortex.consumer);
        assert_eq!(produce(session).await, None);
    }

    #[tokio::test]
    async fn sessions_do_not_share_state() {
        let f = factory();
        let a = f(&Session::new(None));
        let b = f(&Session::new(None));
        let s = Session::new(None);

        (a.consumer.unwrap())(s.clone(), Message::from("for a")).await;
        let from_b = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            (b.producer.unwrap())(s.clone()),
        )
        .await;
        assert!(from_b.is_err());
        assert_eq!((a.producer.unwrap())(s).await, Some(Message::from("for a")));
    }
}
