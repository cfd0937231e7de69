//! OCPP message model and action-type registry.
//!
//! A [`Message`] is the unit every queue, port, and event deals in: a
//! fixed-width printable id, a wire role, the OCPP action, and the encoded
//! payload body. The engine owns the payload bytes and hands them back to
//! the application through the `MessageFree` event before the slot is
//! recycled.
//!
//! The registry maps the [`Action`] enum to the exact OCPP 1.6 action names
//! (case-sensitive) and back. Unknown names parse to `None`.

use serde::{Deserialize, Serialize};

/// Maximum length of a message id, in characters.
///
/// Outbound CALL ids are generated by the host
/// [`IdSource`](crate::ports::IdSource) within this budget (20 base62
/// characters is the conventional width); response ids are copied verbatim
/// from the request.
pub const MESSAGE_ID_MAXLEN: usize = 20;

/// Maximum encoded payload size per message, in bytes.
pub const PAYLOAD_MAXLEN: usize = 512;

/// Printable ASCII message identifier.
pub type MessageId = heapless::String<MESSAGE_ID_MAXLEN>;

/// Encoded action body. Opaque to the engine; it is carried, never parsed.
pub type Payload = heapless::Vec<u8, PAYLOAD_MAXLEN>;

// ───────────────────────────────────────────────────────────────
// Wire role
// ───────────────────────────────────────────────────────────────

/// OCPP-J message role, plus the two pool bookkeeping states.
///
/// `None` marks a free pool slot; `Alloc` is the transient state between
/// claiming a slot and initialising it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    #[default]
    None = 0,
    Alloc = 1,
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

// ───────────────────────────────────────────────────────────────
// Action registry
// ───────────────────────────────────────────────────────────────

/// Every OCPP 1.6 action across the core, firmware management, local auth
/// list, reservation, smart charging, trigger, and security profiles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Action {
    // ── Core profile ──────────────────────────────────────
    #[default]
    Authorize = 0,
    BootNotification,
    ChangeAvailability,
    ChangeConfiguration,
    ClearCache,
    DataTransfer,
    GetConfiguration,
    Heartbeat,
    MeterValues,
    RemoteStartTransaction,
    RemoteStopTransaction,
    Reset,
    StartTransaction,
    StatusNotification,
    StopTransaction,
    UnlockConnector,

    // ── Firmware management ───────────────────────────────
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
    GetDiagnostics,
    UpdateFirmware,

    // ── Local auth list ───────────────────────────────────
    GetLocalListVersion,
    SendLocalList,

    // ── Reservation ───────────────────────────────────────
    CancelReservation,
    ReserveNow,

    // ── Smart charging ────────────────────────────────────
    ClearChargingProfile,
    GetCompositeSchedule,
    SetChargingProfile,

    // ── Remote trigger ────────────────────────────────────
    TriggerMessage,

    // ── Security extensions ───────────────────────────────
    CertificateSigned,
    DeleteCertificate,
    ExtendedTriggerMessage,
    GetInstalledCertificateIds,
    GetLog,
    InstallCertificate,
    LogStatusNotification,
    SecurityEventNotification,
    SignCertificate,
    SignedFirmwareStatusNotification,
    SignedUpdateFirmware,
}

impl Action {
    /// Total number of actions, used to size iteration tables.
    pub const COUNT: usize = 39;

    /// Every action, in registry order.
    pub const ALL: [Action; Action::COUNT] = [
        Action::Authorize,
        Action::BootNotification,
        Action::ChangeAvailability,
        Action::ChangeConfiguration,
        Action::ClearCache,
        Action::DataTransfer,
        Action::GetConfiguration,
        Action::Heartbeat,
        Action::MeterValues,
        Action::RemoteStartTransaction,
        Action::RemoteStopTransaction,
        Action::Reset,
        Action::StartTransaction,
        Action::StatusNotification,
        Action::StopTransaction,
        Action::UnlockConnector,
        Action::DiagnosticsStatusNotification,
        Action::FirmwareStatusNotification,
        Action::GetDiagnostics,
        Action::UpdateFirmware,
        Action::GetLocalListVersion,
        Action::SendLocalList,
        Action::CancelReservation,
        Action::ReserveNow,
        Action::ClearChargingProfile,
        Action::GetCompositeSchedule,
        Action::SetChargingProfile,
        Action::TriggerMessage,
        Action::CertificateSigned,
        Action::DeleteCertificate,
        Action::ExtendedTriggerMessage,
        Action::GetInstalledCertificateIds,
        Action::GetLog,
        Action::InstallCertificate,
        Action::LogStatusNotification,
        Action::SecurityEventNotification,
        Action::SignCertificate,
        Action::SignedFirmwareStatusNotification,
        Action::SignedUpdateFirmware,
    ];

    /// The OCPP 1.6 action name, exactly as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Authorize => "Authorize",
            Action::BootNotification => "BootNotification",
            Action::ChangeAvailability => "ChangeAvailability",
            Action::ChangeConfiguration => "ChangeConfiguration",
            Action::ClearCache => "ClearCache",
            Action::DataTransfer => "DataTransfer",
            Action::GetConfiguration => "GetConfiguration",
            Action::Heartbeat => "Heartbeat",
            Action::MeterValues => "MeterValues",
            Action::RemoteStartTransaction => "RemoteStartTransaction",
            Action::RemoteStopTransaction => "RemoteStopTransaction",
            Action::Reset => "Reset",
            Action::StartTransaction => "StartTransaction",
            Action::StatusNotification => "StatusNotification",
            Action::StopTransaction => "StopTransaction",
            Action::UnlockConnector => "UnlockConnector",
            Action::DiagnosticsStatusNotification => "DiagnosticsStatusNotification",
            Action::FirmwareStatusNotification => "FirmwareStatusNotification",
            Action::GetDiagnostics => "GetDiagnostics",
            Action::UpdateFirmware => "UpdateFirmware",
            Action::GetLocalListVersion => "GetLocalListVersion",
            Action::SendLocalList => "SendLocalList",
            Action::CancelReservation => "CancelReservation",
            Action::ReserveNow => "ReserveNow",
            Action::ClearChargingProfile => "ClearChargingProfile",
            Action::GetCompositeSchedule => "GetCompositeSchedule",
            Action::SetChargingProfile => "SetChargingProfile",
            Action::TriggerMessage => "TriggerMessage",
            Action::CertificateSigned => "CertificateSigned",
            Action::DeleteCertificate => "DeleteCertificate",
            Action::ExtendedTriggerMessage => "ExtendedTriggerMessage",
            Action::GetInstalledCertificateIds => "GetInstalledCertificateIds",
            Action::GetLog => "GetLog",
            Action::InstallCertificate => "InstallCertificate",
            Action::LogStatusNotification => "LogStatusNotification",
            Action::SecurityEventNotification => "SecurityEventNotification",
            Action::SignCertificate => "SignCertificate",
            Action::SignedFirmwareStatusNotification => "SignedFirmwareStatusNotification",
            Action::SignedUpdateFirmware => "SignedUpdateFirmware",
        }
    }

    /// Parse a wire action name. Case-sensitive; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.as_str() == name)
    }

    /// Transaction-related messages (StartTransaction, StopTransaction,
    /// MeterValues) get elevated durability: they retry past the normal
    /// attempt budget and survive transport failure indefinitely.
    pub const fn is_transaction_related(self) -> bool {
        matches!(
            self,
            Action::StartTransaction | Action::StopTransaction | Action::MeterValues
        )
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───────────────────────────────────────────────────────────────
// Message
// ───────────────────────────────────────────────────────────────

/// One OCPP message: request, response, or error response.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Printable identifier correlating a CALL with its response.
    pub id: MessageId,
    /// Wire role.
    pub role: Role,
    /// The OCPP action this message carries.
    pub action: Action,
    /// Encoded action body, owned by the engine until the slot is freed.
    pub payload: Payload,
}

impl Message {
    /// Build an incoming/outgoing frame by hand. Mostly useful for
    /// transports and tests; the engine builds its own slots internally.
    pub fn new(id: MessageId, role: Role, action: Action, payload: Payload) -> Self {
        Self {
            id,
            role,
            action,
            payload,
        }
    }
}
