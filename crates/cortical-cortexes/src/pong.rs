//! `pong`: one fixed `"pong"` reply per received message.

use std::sync::Arc;

use cortical_core::{Cortex, CortexFactory, Message, cortex};
use tokio::sync::{Mutex, mpsc};

/// Registry name.
pub const NAME: &str = "pong";

const REPLY: Message = Message::from_static("pong");

/// Build the pong factory.
pub fn factory() -> CortexFactory {
    cortex::factory(|_session| {
        let (tx, rx) = mpsc::channel::<()>(16);
        let rx = Arc::new(Mutex::new(rx));
        Cortex::new()
            .with_consumer(move |_session, _msg| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(()).await;
                }
            })
            .with_producer(move |_session| {
                let rx = rx.clone();
                async move { rx.lock().await.recv().await.map(|()| REPLY) }
            })
    })
}
