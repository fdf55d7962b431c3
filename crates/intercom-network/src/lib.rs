//! Network layer for the intercom device.
//!
//! This crate accepts the device's TCP connection, turns its traffic into
//! [`DeviceEvent`]s and writes [`DeviceReply`](intercom_protocol::DeviceReply)
//! tokens back.
//!
//! # Components
//!
//! - **DeviceServer**: accept loop, one reader and one writer task per connection
//! - **DeviceLink**: handle to one connection; dropping it closes the socket
//! - **ConnectionManager**: tracks the single active device
//!
//! # Example
//!
//! ```no_run
//! use intercom_network::{ConnectionManager, DeviceEvent, DeviceServer, DeviceServerConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = DeviceServer::bind(DeviceServerConfig::default()).await?;
//! let (tx, mut rx) = mpsc::channel(64);
//! tokio::spawn(server.run(tx));
//!
//! let mut connections = ConnectionManager::new();
//! while let Some(event) = rx.recv().await {
//!     if let DeviceEvent::Connected(link) = event {
//!         if let Some(old) = connections.attach(link) {
//!             old.close();
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod server;

pub use connection::{
    ConnectionId, ConnectionManager, DeviceEvent, DeviceLink, LinkProbe, SendOutcome,
};
pub use error::{NetworkError, Result};
pub use server::{DeviceServer, DeviceServerConfig};
