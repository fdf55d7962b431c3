//! The single in-flight entry request.
//!
//! A [`Session`] exists from the moment a `start` resolves to at least one
//! reviewer until the device confirms a decision, the visitor cancels, or
//! a later `start` finds nobody. Independently of that, it tracks which
//! device command is waiting for its payload ([`PendingCommand`]).
//!
//! # Transitions of the pending command
//!
//! ```text
//! Idle ──start──> AwaitingUnit ──digits──> Idle
//! Idle ──photo──> AwaitingPhoto ──frame complete──> Idle
//! Idle ──accept_ok/reject_ok/cancel──> Awaiting*Confirm/CancelAck ──chunk──> Idle
//! ```
//!
//! A recognised command token always wins, whatever the current state.

use std::fmt;

use chrono::{DateTime, Utc};
use intercom_core::UnitNumber;
use intercom_protocol::DeviceCommand;
use tracing::trace;

/// Device command waiting for its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PendingCommand {
    /// No command in progress; payload chunks are protocol errors.
    #[default]
    Idle,

    /// `start` received, waiting for the unit digits.
    AwaitingUnit,

    /// `photo` received, image frames being decoded.
    AwaitingPhoto,

    /// `accept_ok` received, waiting for its trailing chunk.
    AwaitingAcceptConfirm,

    /// `reject_ok` received, waiting for its trailing chunk.
    AwaitingRejectConfirm,

    /// `cancel` received, waiting for its trailing chunk.
    AwaitingCancelAck,
}

impl PendingCommand {
    /// Command whose payload is expected, `None` when idle.
    pub fn command(self) -> Option<DeviceCommand> {
        match self {
            PendingCommand::Idle => None,
            PendingCommand::AwaitingUnit => Some(DeviceCommand::Start),
            PendingCommand::AwaitingPhoto => Some(DeviceCommand::Photo),
            PendingCommand::AwaitingAcceptConfirm => Some(DeviceCommand::AcceptOk),
            PendingCommand::AwaitingRejectConfirm => Some(DeviceCommand::RejectOk),
            PendingCommand::AwaitingCancelAck => Some(DeviceCommand::Cancel),
        }
    }

    pub fn is_idle(self) -> bool {
        self == PendingCommand::Idle
    }
}

impl From<DeviceCommand> for PendingCommand {
    fn from(command: DeviceCommand) -> Self {
        match command {
            DeviceCommand::Start => PendingCommand::AwaitingUnit,
            DeviceCommand::Photo => PendingCommand::AwaitingPhoto,
            DeviceCommand::AcceptOk => PendingCommand::AwaitingAcceptConfirm,
            DeviceCommand::RejectOk => PendingCommand::AwaitingRejectConfirm,
            DeviceCommand::Cancel => PendingCommand::AwaitingCancelAck,
        }
    }
}

impl fmt::Display for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PendingCommand::Idle => "idle",
            PendingCommand::AwaitingUnit => "awaiting-unit",
            PendingCommand::AwaitingPhoto => "awaiting-photo",
            PendingCommand::AwaitingAcceptConfirm => "awaiting-accept-confirm",
            PendingCommand::AwaitingRejectConfirm => "awaiting-reject-confirm",
            PendingCommand::AwaitingCancelAck => "awaiting-cancel-ack",
        };
        f.write_str(name)
    }
}

/// The in-flight entry request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    unit: Option<UnitNumber>,
    opened_at: Option<DateTime<Utc>>,
    pending: PendingCommand,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit of the active request, if any.
    pub fn unit(&self) -> Option<UnitNumber> {
        self.unit
    }

    pub fn is_active(&self) -> bool {
        self.unit.is_some()
    }

    /// Returns `true` when a request is active for exactly `unit`.
    pub fn is_active_for(&self, unit: UnitNumber) -> bool {
        self.unit == Some(unit)
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Start a request for `unit`.
    ///
    /// Returns the unit of the request that was overwritten, if any.
    pub fn open(&mut self, unit: UnitNumber) -> Option<UnitNumber> {
        self.opened_at = Some(Utc::now());
        self.unit.replace(unit)
    }

    /// End the active request and return its unit.
    pub fn close(&mut self) -> Option<UnitNumber> {
        self.opened_at = None;
        self.unit.take()
    }

    pub fn pending(&self) -> PendingCommand {
        self.pending
    }

    pub fn set_pending(&mut self, pending: PendingCommand) {
        if self.pending != pending {
            trace!(from = %self.pending, to = %pending, "Pending command changed");
            self.pending = pending;
        }
    }

    /// How long the active request has been open.
    pub fn age(&self) -> Option<chrono::Duration> {
        self.opened_at.map(|opened| Utc::now() - opened)
    }

    /// Close the request and return the pending command to idle.
    pub fn reset(&mut self) -> Option<UnitNumber> {
        self.set_pending(PendingCommand::Idle);
        self.close()
    }
}
