//! Chunk classification for the device stream.
//!
//! [`CommandRouter`] decides what a transport chunk means given the
//! session's [`PendingCommand`]:
//!
//! - a chunk that trims to a device command token arms that command;
//! - any other chunk is payload for the armed command;
//! - a payload chunk while idle is a protocol error, except for
//!   whitespace-only chunks which are dropped quietly.
//!
//! Confirmation commands (`accept_ok`, `reject_ok`, `cancel`) are followed
//! by a throwaway chunk on the wire. By default they run when that chunk
//! arrives; with `confirm_on_token` they run on the token itself and the
//! trailing chunk is then dropped as idle whitespace.

use intercom_core::{Error, Result};
use intercom_protocol::DeviceCommand;
use tracing::trace;

use crate::session::{PendingCommand, Session};

/// What the gateway has to do with one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<'a> {
    /// A command token was recognised; its payload comes next.
    Armed(DeviceCommand),

    /// The command is complete enough to run with this payload.
    Run(DeviceCommand, &'a [u8]),

    /// Whitespace-only chunk while idle.
    Ignored,
}

/// Classifies device chunks against the session's pending command.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRouter {
    confirm_on_token: bool,
}

impl CommandRouter {
    pub fn new(confirm_on_token: bool) -> Self {
        Self { confirm_on_token }
    }

    pub fn confirm_on_token(&self) -> bool {
        self.confirm_on_token
    }

    /// Classify `chunk`, updating the session's pending command for tokens.
    ///
    /// Returns [`Error::UnexpectedPayload`] for a non-token chunk while idle.
    pub fn route<'a>(&self, session: &mut Session, chunk: &'a [u8]) -> Result<Dispatch<'a>> {
        if let Some(command) = DeviceCommand::from_chunk(chunk) {
            trace!(command = %command, from = %session.pending(), "Command token");

            if self.confirm_on_token && command.is_confirmation() {
                session.set_pending(PendingCommand::Idle);
                return Ok(Dispatch::Run(command, &[]));
            }

            session.set_pending(PendingCommand::from(command));
            return Ok(Dispatch::Armed(command));
        }

        match session.pending().command() {
            Some(command) => Ok(Dispatch::Run(command, chunk)),
            None if chunk.iter().all(u8::is_ascii_whitespace) => Ok(Dispatch::Ignored),
            None => Err(Error::UnexpectedPayload { len: chunk.len() }),
        }
    }
}
