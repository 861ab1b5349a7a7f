//! In-memory stand-ins for an upgraded websocket.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use axum::extract::ws::Message as WsMessage;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{Sink, Stream, StreamExt};

/// A generic, non-terminal transport error.
pub(crate) fn transport_error() -> axum::Error {
    axum::Error::new(std::io::Error::other("transient transport failure"))
}

/// A sink that records every frame written to it.
pub(crate) fn sink_channel() -> (ChannelSink, UnboundedReceiver<WsMessage>) {
    let (tx, rx) = mpsc::unbounded();
    (ChannelSink(tx), rx)
}

pub(crate) struct ChannelSink(UnboundedSender<WsMessage>);

impl Sink<WsMessage> for ChannelSink {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.poll_ready(cx).map_err(axum::Error::new)
    }

    fn start_send(mut self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
        self.0.start_send(item).map_err(axum::Error::new)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.0.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// Both halves of a fake websocket, as seen by the server.
pub(crate) struct FakeSocket {
    incoming: UnboundedReceiver<Result<WsMessage, axum::Error>>,
    outgoing: ChannelSink,
    close_read: Arc<AtomicBool>,
    late_writes: Arc<AtomicUsize>,
}

/// The peer's side of a [`FakeSocket`].
pub(crate) struct FakePeer {
    /// Frames the peer sends to the server.
    pub(crate) tx: UnboundedSender<Result<WsMessage, axum::Error>>,
    /// Frames the server wrote to the peer.
    pub(crate) rx: UnboundedReceiver<WsMessage>,
    late_writes: Arc<AtomicUsize>,
}

impl FakePeer {
    /// Send a text frame.
    pub(crate) fn send_text(&self, text: &str) {
        let _ = self.tx.unbounded_send(Ok(WsMessage::Text(text.to_owned().into())));
    }

    /// Send any frame.
    pub(crate) fn send(&self, frame: WsMessage) {
        let _ = self.tx.unbounded_send(Ok(frame));
    }

    /// Inject a transport error.
    pub(crate) fn send_error(&self, err: axum::Error) {
        let _ = self.tx.unbounded_send(Err(err));
    }

    /// Frames the server started writing after it had read a close frame.
    pub(crate) fn writes_after_close(&self) -> usize {
        self.late_writes.load(Ordering::SeqCst)
    }

    /// Next frame written by the server, as text.
    pub(crate) async fn next_text(&mut self) -> Option<String> {
        loop {
            match self.rx.next().await? {
                WsMessage::Text(t) => return Some(t.as_str().to_owned()),
                _ => {}
            }
        }
    }
}

pub(crate) fn fake_socket() -> (FakeSocket, FakePeer) {
    let (in_tx, in_rx) = mpsc::unbounded();
    let (sink, out_rx) = sink_channel();
    let late_writes = Arc::new(AtomicUsize::new(0));
    (
        FakeSocket {
            incoming: in_rx,
            outgoing: sink,
            close_read: Arc::new(AtomicBool::new(false)),
            late_writes: late_writes.clone(),
        },
        FakePeer {
            tx: in_tx,
            rx: out_rx,
            late_writes,
        },
    )
}

impl Stream for FakeSocket {
    type Item = Result<WsMessage, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = self.incoming.poll_next_unpin(cx);
        if let Poll::Ready(Some(Ok(WsMessage::Close(_)))) = &next {
            self.close_read.store(true, Ordering::SeqCst);
        }
        next
    }
}

impl Sink<WsMessage> for FakeSocket {
    type Error = axum::Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.outgoing).poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
        if self.close_read.load(Ordering::SeqCst) {
            let _ = self.late_writes.fetch_add(1, Ordering::SeqCst);
        }
        Pin::new(&mut self.outgoing).start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.outgoing).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.outgoing).poll_close(cx)
    }
}
