//! OCPP 1.6 charge point message engine.
//!
//! The client-side state machine of a Charge Point: it owns outbound
//! requests, matches responses to the single in-flight CALL, retries per
//! OCPP's asymmetric rules (transactions forever, others until a budget,
//! BootNotification never dropped), drives heartbeats when the link is
//! idle, and evicts the oldest shedable message under pool pressure.
//!
//! Everything wire- or platform-shaped stays outside: framing and JSON
//! live in the transport adapter behind [`ports::LinkPort`], time arrives
//! as an explicit `now` argument, message-id randomness behind
//! [`ports::IdSource`], configuration behind [`ports::ConfigPort`], and
//! lifecycle notifications leave through [`ports::EventSink`]. The engine
//! is single-threaded and cooperative; the host calls
//! [`Engine::step`](engine::Engine::step) on its own cadence and acts on
//! the events it collected once the step returns.

#![deny(unused_must_use)]

pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod pool;
pub mod ports;
pub mod queue;

mod snapshot;

pub use engine::{Engine, DEFAULT_TX_RETRIES, DEFAULT_TX_TIMEOUT_SECS};
pub use error::{Error, Result};
pub use message::{Action, Message, MessageId, Payload, Role};
pub use ports::{ConfigPort, EngineEvent, EventSink, IdSource, LinkPort};

/// Wall-clock seconds, supplied by the host on every time-sensitive call.
pub type Timestamp = u64;
