//! `dummy`: a slow producer for exercising backpressure and shutdown.

use std::time::Duration;

use cortical_core::{Cortex, CortexFactory, Message, cortex};
use cortical_settings::DummySettings;
use rand::Rng;
use tracing::debug;

/// Registry name.
pub const NAME: &str = "dummy";

/// Build the dummy factory.
///
/// Each session draws a delay from `[min_ms, max_ms)`. The producer sleeps that
/// long and emits the delay in milliseconds as text; the consumer only logs.
pub fn factory(settings: &DummySettings) -> CortexFactory {
    let (min, max) = (settings.min_ms, settings.max_ms.max(settings.min_ms.saturating_add(1)));
    cortex::factory(move |_session| {
        let delay_ms = rand::rng().random_range(min..max);
        let delay = Duration::from_millis(delay_ms);
        Cortex::new()
            .with_producer(move |_session| async move {
                tokio::time::sleep(delay).await;
                Some(Message::from(delay_ms.to_string()))
            })
            .with_consumer(|session, msg| async move {
                debug!(session_id = %session.id(), len = msg.len(), "dummy received message");
            })
    })
}
