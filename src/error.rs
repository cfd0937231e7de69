//! Unified error type for the message engine.
//!
//! A single `Copy` enum every fallible path funnels into, keeping the host
//! loop's error handling uniform. A benign empty poll is not an error:
//! [`LinkPort::recv`](crate::ports::LinkPort::recv) models "no frame
//! pending" as `Ok(None)`.

use core::fmt;

/// Every fallible engine operation resolves to this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The message pool is exhausted. Recoverable by forcing eviction or
    /// waiting for an in-flight message to complete.
    OutOfMemory,
    /// An incoming response matched no in-flight request; the originating
    /// call was already freed or never issued.
    NoLink,
    /// A frame or snapshot failed validation (bad role, bad header).
    Invalid,
    /// Transient transport failure on send or receive; the affected
    /// message stays on the retry path.
    Transport,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "message pool exhausted"),
            Self::NoLink => write!(f, "no matching request in flight"),
            Self::Invalid => write!(f, "validation failed"),
            Self::Transport => write!(f, "transport failure"),
        }
    }
}

/// Engine-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
