//! Per-connection session handle.
//!
//! A [`Session`] is created when a connection is upgraded and handed, by value,
//! to every cortex factory and every producer/consumer invocation. It is the
//! only way a cortex learns which connection it is serving.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known key under which [`Session::get`] exposes the session identifier.
pub const SESSION_ID_KEY: &str = "session_id";

/// Key under which [`Session::get`] exposes the peer address, when known.
pub const REMOTE_ADDR_KEY: &str = "remote_addr";

/// Process-unique session identifier (UUID v7, time-ordered).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

struct Inner {
    id: SessionId,
    remote_addr: Option<SocketAddr>,
    remote_addr_text: Option<String>,
}

/// Cheaply clonable session handle.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Start a new session with a fresh identifier.
    pub fn new(remote_addr: Option<SocketAddr>) -> Self {
        Self::with_id(SessionId::new(), remote_addr)
    }

    /// Start a session with a caller-chosen identifier.
    pub fn with_id(id: SessionId, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                remote_addr,
                remote_addr_text: remote_addr.map(|a| a.to_string()),
            }),
        }
    }

    /// The session identifier.
    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// Peer address of the upgraded connection.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    /// Look up a session attribute by its well-known key.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            SESSION_ID_KEY => Some(self.inner.id.as_str()),
            REMOTE_ADDR_KEY => self.inner.remote_addr_text.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id.as_str())
            .field("remote_addr", &self.inner.remote_addr)
            .finish()
    }
}
