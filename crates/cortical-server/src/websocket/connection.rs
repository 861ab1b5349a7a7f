//! Connection adapter: the read and write loops owning one upgraded socket.
//!
//! The socket is split once. The read half feeds inbound text frames to the
//! fan-out channel; the write half drains the merged outbound stream plus a
//! control channel carrying error envelopes raised by the read loop. Whichever
//! loop first sees a terminal condition raises the shared [`ClosedSignal`].

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};

use axum::extract::ws::{CloseFrame, Message as WsMessage, close_code};
use bytes::Bytes;
use cortical_core::{ErrorEnvelope, Message};
use futures::{Sink, SinkExt, Stream, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::metrics::{
    WS_FRAMES_IN_TOTAL, WS_FRAMES_OUT_TOTAL, WS_PROTOCOL_VIOLATIONS_TOTAL,
    WS_TRANSPORT_ERRORS_TOTAL,
};

/// Why a session's connection stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame with normal closure, going away or no status.
    PeerClosed(Option<u16>),
    /// The connection was already gone (stream ended, reset, broken pipe).
    AlreadyClosed,
    /// Too many consecutive transport errors.
    TransportFailure,
    /// The server is shutting down.
    ServerShutdown,
}

impl CloseReason {
    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed(_) => "peer_closed",
            Self::AlreadyClosed => "already_closed",
            Self::TransportFailure => "transport_failure",
            Self::ServerShutdown => "server_shutdown",
        }
    }

    /// Whether this reason ends a session as a failure.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::TransportFailure)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed(Some(code)) => write!(f, "peer_closed({code})"),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// One-shot "closed" signal shared by both loops and the dispatcher.
///
/// The first [`signal`](Self::signal) records its reason; later calls are
/// ignored.
#[derive(Debug, Default)]
pub struct ClosedSignal {
    token: CancellationToken,
    reason: OnceLock<CloseReason>,
}

impl ClosedSignal {
    /// Create an unraised signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` only for the call that won.
    pub fn signal(&self, reason: CloseReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            self.token.cancel();
        }
        first
    }

    /// The recorded reason, if raised.
    pub fn reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// Whether the signal has been raised.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until raised and return the winning reason.
    pub async fn closed(&self) -> CloseReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(CloseReason::AlreadyClosed)
    }
}

/// How a transport error affects the loop that saw it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The connection is gone; stop and raise "closed" with this reason.
    Terminal(CloseReason),
    /// Report, count against the error budget and keep going.
    Transient,
}

/// Close codes that end a session gracefully.
pub fn is_graceful_close(code: Option<u16>) -> bool {
    match code {
        None => true,
        Some(code) => matches!(code, close_code::NORMAL | close_code::AWAY | close_code::STATUS),
    }
}

/// Classify an error surfaced by the websocket stream or sink.
pub fn classify_error(err: &axum::Error) -> Disposition {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(ws_err) = cause.downcast_ref::<tungstenite::Error>() {
            match ws_err {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    return Disposition::Terminal(CloseReason::AlreadyClosed);
                }
                tungstenite::Error::Protocol(
                    tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
                    | tungstenite::error::ProtocolError::SendAfterClosing,
                ) => return Disposition::Terminal(CloseReason::AlreadyClosed),
                _ => {}
            }
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ) {
                return Disposition::Terminal(CloseReason::AlreadyClosed);
            }
        }
        source = cause.source();
    }
    Disposition::Transient
}

/// Consecutive-error counter for one loop.
#[derive(Debug)]
pub struct ErrorBudget {
    max: u32,
    consecutive: u32,
}

impl ErrorBudget {
    /// Allow up to `max` consecutive errors (`0` is treated as `1`).
    pub fn new(max: u32) -> Self {
        Self {
            max: max.max(1),
            consecutive: 0,
        }
    }

    /// Record an error. Returns `true` once the budget is exhausted.
    pub fn record(&mut self) -> bool {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive >= self.max
    }

    /// A frame went through; start counting again.
    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Errors recorded since the last reset.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// Channels and signals the two loops share with the dispatcher.
#[derive(Clone, Debug)]
pub struct LoopContext {
    /// Raised by whichever loop terminates first.
    pub closed: Arc<ClosedSignal>,
    /// Cancelled by the dispatcher when the session drains.
    pub shutdown: CancellationToken,
    /// Consecutive transport errors tolerated per loop.
    pub max_consecutive_errors: u32,
}

/// Read frames until a terminal condition.
///
/// Text frames go to `inbound`. Binary frames are answered with a 501
/// envelope through `control`. Ping and pong frames are ignored.
pub async fn read_loop<R>(
    mut stream: R,
    inbound: mpsc::Sender<Message>,
    control: mpsc::Sender<ErrorEnvelope>,
    ctx: LoopContext,
) where
    R: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    let mut budget = ErrorBudget::new(ctx.max_consecutive_errors);

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        match next {
            None => {
                let _ = ctx.closed.signal(CloseReason::AlreadyClosed);
                break;
            }
            Some(Ok(WsMessage::Text(text))) => {
                budget.reset();
                counter!(WS_FRAMES_IN_TOTAL).increment(1);
                let msg = Message::new(Bytes::copy_from_slice(text.as_str().as_bytes()));
                tokio::select! {
                    biased;
                    () = ctx.shutdown.cancelled() => break,
                    sent = inbound.send(msg) => {
                        if sent.is_err() {
                            debug!("inbound channel closed");
                            break;
                        }
                    }
                }
            }
            Some(Ok(WsMessage::Binary(data))) => {
                budget.reset();
                counter!(WS_PROTOCOL_VIOLATIONS_TOTAL).increment(1);
                info!(len = data.len(), "rejecting binary frame");
                tokio::select! {
                    biased;
                    () = ctx.shutdown.cancelled() => break,
                    _ = control.send(ErrorEnvelope::unsupported_frame()) => {}
                }
            }
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                budget.reset();
                trace!("control frame");
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let code = frame.as_ref().map(|f| f.code);
                if is_graceful_close(code) {
                    info!(code, "peer closed connection");
                    let _ = ctx.closed.signal(CloseReason::PeerClosed(code));
                    break;
                }
                warn!(code, "peer closed connection with an error code");
                counter!(WS_TRANSPORT_ERRORS_TOTAL, "loop" => "read").increment(1);
                if budget.record() {
                    let _ = ctx.closed.signal(CloseReason::TransportFailure);
                    break;
                }
            }
            Some(Err(err)) => match classify_error(&err) {
                Disposition::Terminal(reason) => {
                    debug!(error = %err, "connection gone");
                    let _ = ctx.closed.signal(reason);
                    break;
                }
                Disposition::Transient => {
                    warn!(error = %err, consecutive = budget.consecutive() + 1, "read error");
                    counter!(WS_TRANSPORT_ERRORS_TOTAL, "loop" => "read").increment(1);
                    if budget.record() {
                        let _ = ctx.closed.signal(CloseReason::TransportFailure);
                        break;
                    }
                    let _ = control.try_send(ErrorEnvelope::internal(err.to_string()));
                }
            },
        }
    }
    debug!("read loop exited");
}

/// Write merged outbound messages and control envelopes as text frames.
///
/// The loop keeps serving `control` after `outbound` closes, so a session with
/// no producers still reports protocol errors. Once the connection is closed no
/// further data frame is started. On server shutdown a close frame with "going
/// away" is sent before the sink is released.
pub async fn write_loop<W>(
    mut sink: W,
    mut outbound: mpsc::Receiver<Message>,
    mut control: mpsc::Receiver<ErrorEnvelope>,
    ctx: LoopContext,
) where
    W: Sink<WsMessage, Error = axum::Error> + Unpin,
{
    let mut budget = ErrorBudget::new(ctx.max_consecutive_errors);
    let mut outbound_open = true;
    let mut control_open = true;

    while outbound_open || control_open {
        let msg = tokio::select! {
            biased;
            () = ctx.shutdown.cancelled() => break,
            _ = ctx.closed.closed() => break,
            envelope = control.recv(), if control_open => match envelope {
                Some(envelope) => envelope.to_message(),
                None => {
                    control_open = false;
                    continue;
                }
            },
            next = outbound.recv(), if outbound_open => match next {
                Some(msg) => msg,
                None => {
                    debug!("outbound stream closed");
                    outbound_open = false;
                    continue;
                }
            },
        };

        let frame = WsMessage::Text(to_text(&msg).into());
        let sent = tokio::select! {
            biased;
            _ = ctx.closed.closed() => break,
            sent = sink.send(frame) => sent,
        };
        match sent {
            Ok(()) => {
                budget.reset();
                counter!(WS_FRAMES_OUT_TOTAL).increment(1);
            }
            Err(err) => match classify_error(&err) {
                Disposition::Terminal(reason) => {
                    debug!(error = %err, "connection gone");
                    let _ = ctx.closed.signal(reason);
                    break;
                }
                Disposition::Transient => {
                    warn!(error = %err, consecutive = budget.consecutive() + 1, "write error");
                    counter!(WS_TRANSPORT_ERRORS_TOTAL, "loop" => "write").increment(1);
                    if budget.record() {
                        let _ = ctx.closed.signal(CloseReason::TransportFailure);
                        break;
                    }
                }
            },
        }
    }

    if ctx.closed.reason() == Some(CloseReason::ServerShutdown) {
        let frame = CloseFrame {
            code: close_code::AWAY,
            reason: "server shutting down".into(),
        };
        let _ = sink.send(WsMessage::Close(Some(frame))).await;
    }
    debug!("write loop exited");
}

fn to_text(msg: &Message) -> String {
    if let Some(text) = msg.as_str() {
        return text.to_owned();
    }
    warn!(len = msg.len(), "outbound message is not valid UTF-8, converting lossily");
    msg.to_text_lossy().into_owned()
}
