//! # cortical-server
//!
//! Bridges one websocket connection to any number of cortexes.
//!
//! - [`dispatch`]: the transport-agnostic primitives (fan-out, merge, worker
//!   wrappers with per-worker stop signals)
//! - [`websocket`]: the connection adapter (read/write loops, close
//!   classification) and the per-session dispatcher state machine
//! - [`server`]: Axum router with the `/ws` upgrade route, `/health`,
//!   `/metrics` and static files, plus graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{DispatchConfig, ServerConfig};
pub use errors::{Result, ServerError};
pub use server::CorticalServer;
pub use websocket::session::{Dispatcher, SessionReport, SessionState};
