//! WebSocket session handling: the connection adapter and the per-session
//! dispatcher built on top of it.

pub mod connection;
pub mod session;
