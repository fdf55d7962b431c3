//! Command vocabulary of the device link.
//!
//! Inbound commands ([`DeviceCommand`]) are recognised only at the parse
//! boundary: once a chunk has been classified, the rest of the system
//! matches on the enum and never on raw strings.
//!
//! # Classification
//!
//! A chunk is a command when its UTF-8 content, trimmed of surrounding
//! whitespace, equals a token exactly. Anything else is payload for the
//! pending command:
//!
//! ```
//! use intercom_protocol::DeviceCommand;
//!
//! assert_eq!(DeviceCommand::from_chunk(b"start\n"), Some(DeviceCommand::Start));
//! assert_eq!(DeviceCommand::from_chunk(b"42"), None);
//! assert_eq!(DeviceCommand::from_chunk(&[0xff, 0xd8]), None);
//! ```

use std::fmt;

use intercom_core::constants::{
    TOKEN_ACCEPT, TOKEN_ACCEPT_OK, TOKEN_CANCEL, TOKEN_NOT_FOUND, TOKEN_PHOTO, TOKEN_REJECT,
    TOKEN_REJECT_OK, TOKEN_START,
};
use intercom_core::{Error, Result, ReviewerAction};

/// Commands originated by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    /// A visitor dialled a unit; payload is the unit number.
    Start,

    /// Image transfer; payload is one length-prefixed frame.
    Photo,

    /// The visitor cancelled; payload ignored.
    Cancel,

    /// The device opened the door; payload ignored.
    AcceptOk,

    /// The device refused entry; payload ignored.
    RejectOk,
}

impl DeviceCommand {
    /// Every device command, in declaration order.
    pub const ALL: [DeviceCommand; 5] = [
        DeviceCommand::Start,
        DeviceCommand::Photo,
        DeviceCommand::Cancel,
        DeviceCommand::AcceptOk,
        DeviceCommand::RejectOk,
    ];

    /// Wire token of this command.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            DeviceCommand::Start => TOKEN_START,
            DeviceCommand::Photo => TOKEN_PHOTO,
            DeviceCommand::Cancel => TOKEN_CANCEL,
            DeviceCommand::AcceptOk => TOKEN_ACCEPT_OK,
            DeviceCommand::RejectOk => TOKEN_REJECT_OK,
        }
    }

    /// Classify a raw transport chunk.
    ///
    /// Returns `None` for payload chunks, including binary data that is not
    /// valid UTF-8.
    #[must_use]
    pub fn from_chunk(chunk: &[u8]) -> Option<Self> {
        std::str::from_utf8(chunk).ok()?.parse().ok()
    }

    /// Returns `true` for the commands that close a session and carry no
    /// meaningful payload.
    #[must_use]
    pub fn is_confirmation(self) -> bool {
        match self {
            DeviceCommand::Cancel | DeviceCommand::AcceptOk | DeviceCommand::RejectOk => true,
            DeviceCommand::Start | DeviceCommand::Photo => false,
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for DeviceCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            TOKEN_START => Ok(DeviceCommand::Start),
            TOKEN_PHOTO => Ok(DeviceCommand::Photo),
            TOKEN_CANCEL => Ok(DeviceCommand::Cancel),
            TOKEN_ACCEPT_OK => Ok(DeviceCommand::AcceptOk),
            TOKEN_REJECT_OK => Ok(DeviceCommand::RejectOk),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}

/// Tokens written to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceReply {
    /// The announced unit has no reviewers.
    NotFound,

    /// Capture and send a camera frame.
    Photo,

    /// Open the door.
    Accept,

    /// Refuse entry.
    Reject,
}

impl DeviceReply {
    /// Wire token of this reply.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            DeviceReply::NotFound => TOKEN_NOT_FOUND,
            DeviceReply::Photo => TOKEN_PHOTO,
            DeviceReply::Accept => TOKEN_ACCEPT,
            DeviceReply::Reject => TOKEN_REJECT,
        }
    }
}

impl fmt::Display for DeviceReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl From<ReviewerAction> for DeviceReply {
    fn from(action: ReviewerAction) -> Self {
        match action {
            ReviewerAction::Photo => DeviceReply::Photo,
            ReviewerAction::Accept => DeviceReply::Accept,
            ReviewerAction::Reject => DeviceReply::Reject,
        }
    }
}
