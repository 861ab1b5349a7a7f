//! `ping`: producer-only heartbeat.

use std::time::Duration;

use cortical_core::{Cortex, CortexFactory, Message, cortex};
use cortical_settings::PingSettings;

/// Registry name.
pub const NAME: &str = "ping";

/// Build the ping factory: emits `settings.payload` every `settings.interval_ms`.
pub fn factory(settings: &PingSettings) -> CortexFactory {
    let interval = Duration::from_millis(settings.interval_ms.max(1));
    let payload = Message::from(settings.payload.clone());
    cortex::factory(move |_session| {
        let payload = payload.clone();
        Cortex::new().with_producer(move |_session| {
            let payload = payload.clone();
            async move {
                tokio::time::sleep(interval).await;
                Some(payload)
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortical_core::Session;

    #[tokio::test(start_paused = true)]
    async fn emits_after_each_interval() {
        let settings = PingSettings {
            interval_ms: 250,
            payload: "ping".into(),
        };
        let session = Session::new(None);
        let cortex = factory(&settings)(&session);
        assert!(cortex.consumer.is_none());
        let produce = cortex.producer.unwrap();

        let start = tokio::time::Instant::now();
        assert_eq!(produce(session.clone()).await, Some(Message::from("ping")));
        assert_eq!(produce(session).await, Some(Message::from("ping")));
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
