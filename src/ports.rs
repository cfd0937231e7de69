//! Port traits: the boundary between the engine and its collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Engine (domain)
//! ```
//!
//! The engine owns no transport, clock, RNG, or configuration storage.
//! Adapters implement these traits and are passed into the methods that
//! need them (`step`, `push_request`, ...), so the engine never holds a
//! reference to the outside world between calls.
//!
//! Wall-clock time is not a trait: the host passes `now` explicitly into
//! every time-sensitive call, which keeps the engine deterministic and
//! trivially testable.

use crate::error::{Error, Result};
use crate::message::{Message, MessageId};

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: engine ↔ Central System transport)
// ───────────────────────────────────────────────────────────────

/// Framed transport to the Central System, typically a WebSocket carrying
/// OCPP-J. Framing and JSON encoding live entirely in the adapter; the
/// engine only sees [`Message`]s.
pub trait LinkPort {
    /// Hand one message to the transport. `Ok(())` means the bytes were
    /// accepted; [`Error::Transport`] is a transient failure and puts the
    /// message on the retry path.
    fn send(&mut self, msg: &Message) -> Result<()>;

    /// Poll for one incoming frame. `Ok(None)` means nothing is pending
    /// (fully silent: no event, no timestamp update). The adapter must
    /// populate `id`, `role`, `action`, and the payload bytes.
    fn recv(&mut self) -> Result<Option<Message>>;
}

/// A link that accepts every send and never yields a frame. Useful as a
/// default while the network is down.
pub struct NullLink;

impl LinkPort for NullLink {
    fn send(&mut self, _msg: &Message) -> Result<()> {
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<Message>> {
        Ok(None)
    }
}

// ───────────────────────────────────────────────────────────────
// Message-id source (driven adapter: host RNG → engine)
// ───────────────────────────────────────────────────────────────

/// Produces unique printable ids for outbound CALL messages.
///
/// Uniqueness across live messages is the adapter's contract; a 20-char
/// base62 id drawn from a decent RNG makes collisions a non-concern.
pub trait IdSource {
    fn next_id(&mut self) -> MessageId;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: engine ← config store)
// ───────────────────────────────────────────────────────────────

/// Read-only view of the OCPP configuration keys the engine consumes.
///
/// Values are read on demand on every step; the engine caches nothing, so
/// a `ChangeConfiguration` from the Central System takes effect on the
/// next tick without any notification machinery.
pub trait ConfigPort {
    /// `HeartbeatInterval` in seconds. Zero disables heartbeats.
    fn heartbeat_interval(&self) -> u32;

    /// `TransactionMessageAttempts`: how many CALLERROR retries a
    /// transaction-related message gets before it is dropped.
    fn transaction_message_attempts(&self) -> u32;

    /// `TransactionMessageRetryInterval` in seconds; multiplied by the
    /// attempt count for linear backoff.
    fn transaction_message_retry_interval(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: engine → application)
// ───────────────────────────────────────────────────────────────

/// Engine lifecycle notification.
///
/// Events are emitted while the engine is mid-step; the application
/// records what it needs (cloning the borrowed message if necessary) and
/// acts after `step` returns, e.g. by calling
/// [`push_response`](crate::engine::Engine::push_response) for an incoming
/// CALL.
#[derive(Debug)]
pub enum EngineEvent<'a> {
    /// A frame arrived from the Central System. For a CALL the application
    /// must produce a response; for a CALLRESULT/CALLERROR this reports
    /// the already-matched response.
    MessageIncoming(&'a Message),
    /// Reserved; never emitted by the current engine.
    MessageOutgoing(&'a Message),
    /// The message is about to be recycled: response matched, retries
    /// exhausted, evicted, or dropped by type. Last chance to inspect the
    /// payload.
    MessageFree(&'a Message),
    /// A transport or protocol error. `message` carries the offending
    /// frame when there is one.
    Error {
        error: Error,
        message: Option<&'a Message>,
    },
}

/// The engine reports lifecycle events through this port.
pub trait EventSink {
    fn emit(&mut self, event: EngineEvent<'_>);
}

/// Sink that discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: EngineEvent<'_>) {}
}
