use thiserror::Error;

use crate::ConnectionId;

/// Errors raised by the device transport.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Binding the listener failed
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The writer task of a connection is gone
    #[error("Connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
