//! Runtime identities for open connections.
//!
//! A connection has no persisted identifier.  The relay only needs to tell
//! one open connection from another (so a broadcast can skip its sender), so
//! each connection gets a [`ConnectionId`] from a process-wide
//! [`ConnectionIdAllocator`] when its transport session is accepted.
//!
//! # Thread safety
//!
//! The allocator uses `AtomicU64`, so the accept loop and tests can hand out
//! identities from any thread without a lock.  Identities increase
//! monotonically, which makes "admission order" and "identity order" the same
//! thing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of one open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw value.  Intended for tests and diagnostics; production code
    /// obtains identities from a [`ConnectionIdAllocator`].
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hands out unique, monotonically increasing [`ConnectionId`]s.
///
/// # Examples
///
/// ```rust
/// use chat_core::ConnectionIdAllocator;
///
/// let ids = ConnectionIdAllocator::new();
/// let a = ids.next();
/// let b = ids.next();
/// assert!(a < b);
/// ```
#[derive(Debug)]
pub struct ConnectionIdAllocator {
    inner: AtomicU64,
}

impl ConnectionIdAllocator {
    /// Creates an allocator whose first identity is `conn-1`.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns a fresh identity.
    ///
    /// `Relaxed` is enough: the value is only used for identity, not to
    /// publish other memory.
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.inner.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of identities handed out so far.
    pub fn issued(&self) -> u64 {
        self.inner.load(Ordering::Relaxed) - 1
    }
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
