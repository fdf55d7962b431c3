use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Unknown command token: {0:?}")]
    UnknownCommand(String),

    #[error("Unexpected payload while idle ({len} bytes)")]
    UnexpectedPayload { len: usize },

    #[error("Invalid unit number: {0:?}")]
    InvalidUnitNumber(String),

    #[error("Frame too large: declared {declared} bytes, limit {max_size}")]
    FrameTooLarge { declared: usize, max_size: usize },

    #[error("Invalid callback data: {0:?}")]
    InvalidCallback(String),

    // Device connection errors
    #[error("No device connected")]
    DeviceNotConnected,

    // Collaborator errors
    #[error("Delivery to reviewer {reviewer} failed: {message}")]
    Delivery { reviewer: i64, message: String },

    #[error("Registry error: {0}")]
    Registry(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a delivery error for the given reviewer.
    pub fn delivery(reviewer: impl Into<i64>, message: impl Into<String>) -> Self {
        Self::Delivery {
            reviewer: reviewer.into(),
            message: message.into(),
        }
    }

    /// Create a registry error from any displayable source.
    pub fn registry(source: impl std::fmt::Display) -> Self {
        Self::Registry(source.to_string())
    }

    /// Returns `true` for errors caused by malformed bytes from the device.
    ///
    /// Protocol errors are logged and the connection is kept open.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownCommand(_)
                | Error::UnexpectedPayload { .. }
                | Error::InvalidUnitNumber(_)
                | Error::FrameTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
