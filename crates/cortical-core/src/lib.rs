//! # cortical-core
//!
//! Shared vocabulary for the Cortical dispatcher and its cortexes:
//!
//! - **Message**: opaque, immutable byte payload carried by text frames
//! - **Session**: per-connection handle with a unique `SessionId`
//! - **Cortex**: an optional producer plus an optional consumer, built per session
//! - **Error envelope**: `{"msg", "code"}` wire shape for errors sent to clients
//! - **Errors**: `CoreError` via `thiserror`

#![deny(unsafe_code)]

pub mod cortex;
pub mod envelope;
pub mod errors;
pub mod message;
pub mod session;

pub use cortex::{ConsumeFn, Cortex, CortexFactory, ProduceFn};
pub use envelope::ErrorEnvelope;
pub use errors::{CoreError, Result};
pub use message::Message;
pub use session::{REMOTE_ADDR_KEY, SESSION_ID_KEY, Session, SessionId};
