//! The cortex contract: an optional producer and an optional consumer.
//!
//! A cortex is not a trait object hierarchy. It is a pair of optional function
//! values returned by a [`CortexFactory`] once per session:
//!
//! - a **producer** `Session -> Option<Message>`, invoked repeatedly by the
//!   dispatcher; each `Some` is forwarded to the connection, `None` means the
//!   producer is exhausted and its worker ends
//! - a **consumer** `(Session, Message) -> ()`, invoked once per inbound message
//!
//! A consumer that wants to answer does so through a channel it shares with its
//! own producer; it never returns a reply directly.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::message::Message;
use crate::session::Session;

/// Producer function: yields the next outbound message, or `None` when done.
pub type ProduceFn = Arc<dyn Fn(Session) -> BoxFuture<'static, Option<Message>> + Send + Sync>;

/// Consumer function: handles one inbound message.
pub type ConsumeFn = Arc<dyn Fn(Session, Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Builds the producer/consumer pair for one session.
pub type CortexFactory = Arc<dyn Fn(&Session) -> Cortex + Send + Sync>;

/// The capabilities one cortex contributes to a session.
#[derive(Clone, Default)]
pub struct Cortex {
    /// Outbound half, if any.
    pub producer: Option<ProduceFn>,
    /// Inbound half, if any.
    pub consumer: Option<ConsumeFn>,
}

impl Cortex {
    /// A cortex with neither capability.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a producer.
    #[must_use]
    pub fn with_producer<F, Fut>(mut self, produce: F) -> Self
    where
        F: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Message>> + Send + 'static,
    {
        self.producer = Some(Arc::new(move |session| Box::pin(produce(session))));
        self
    }

    /// Attach a consumer.
    #[must_use]
    pub fn with_consumer<F, Fut>(mut self, consume: F) -> Self
    where
        F: Fn(Session, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.consumer = Some(Arc::new(move |session, msg| Box::pin(consume(session, msg))));
        self
    }

    /// Whether this cortex contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.producer.is_none() && self.consumer.is_none()
    }
}

impl std::fmt::Debug for Cortex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cortex")
            .field("producer", &self.producer.is_some())
            .field("consumer", &self.consumer.is_some())
            .finish()
    }
}

/// Wrap a closure as a [`CortexFactory`].
pub fn factory<F>(build: F) -> CortexFactory
where
    F: Fn(&Session) -> Cortex + Send + Sync + 'static,
{
    Arc::new(build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_cortex() {
        let cortex = Cortex::new();
        assert!(cortex.is_empty());
        assert!(cortex.producer.is_none());
        assert!(cortex.consumer.is_none());
    }

    #[tokio::test]
    async fn producer_receives_session() {
        let cortex = Cortex::new().with_producer(|session: Session| async move {
            Some(Message::from(session.id().to_string()))
        });
        let session = Session::new(None);
        let produce = cortex.producer.clone().unwrap();
        let msg = produce(session.clone()).await.unwrap();
        assert_eq!(msg.as_str(), Some(session.id().as_str()));
    }

    #[tokio::test]
    async fn consumer_invoked_per_message() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let cortex = Cortex::new().with_consumer(move |_session, _msg| {
            let counter = counter.clone();
            async move {
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let consume = cortex.consumer.clone().unwrap();
        let session = Session::new(None);
        consume(session.clone(), Message::from_static("a")).await;
        consume(session, Message::from_static("b")).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn factory_builds_per_session() {
        let build = factory(|_session| Cortex::new().with_producer(|_| async { None }));
        let cortex = build(&Session::new(None));
        assert!(cortex.producer.is_some());
        assert!(cortex.consumer.is_none());
    }

    #[test]
    fn debug_shows_capabilities() {
        let cortex = Cortex::new().with_consumer(|_, _| async {});
        let debug = format!("{cortex:?}");
        assert!(debug.contains("producer: false"));
        assert!(debug.contains("consumer: true"));
    }
}
