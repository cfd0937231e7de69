//! OCPP configuration values consumed by the engine.
//!
//! Storage and the full OCPP key/value machinery are external; the engine
//! only ever reads the three keys below, through
//! [`ConfigPort`](crate::ports::ConfigPort). `OcppConfig` is the plain
//! in-memory shape of those keys, handy as the port implementation for
//! hosts that keep configuration in a struct and persist it as a blob.

use serde::{Deserialize, Serialize};

use crate::ports::ConfigPort;

/// Engine-relevant OCPP 1.6 configuration keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcppConfig {
    /// `HeartbeatInterval` (seconds). 0 disables heartbeats.
    pub heartbeat_interval_secs: u32,
    /// `TransactionMessageAttempts`: CALLERROR retry budget for
    /// transaction-related messages.
    pub transaction_message_attempts: u32,
    /// `TransactionMessageRetryInterval` (seconds), scaled linearly by the
    /// attempt count.
    pub transaction_message_retry_interval_secs: u32,
}

impl Default for OcppConfig {
    fn default() -> Self {
        Self {
            // Disabled until the Central System supplies an interval in
            // BootNotification.conf; also keeps the link quiet before the
            // boot handshake completes.
            heartbeat_interval_secs: 0,
            transaction_message_attempts: 3,
            transaction_message_retry_interval_secs: 60,
        }
    }
}

impl ConfigPort for OcppConfig {
    fn heartbeat_interval(&self) -> u32 {
        self.heartbeat_interval_secs
    }

    fn transaction_message_attempts(&self) -> u32 {
        self.transaction_message_attempts
    }

    fn transaction_message_retry_interval(&self) -> u32 {
        self.transaction_message_retry_interval_secs
    }
}
