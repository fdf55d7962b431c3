//! TCP listener for the intercom device.
//!
//! The server accepts connections and turns each one into a pair of tasks:
//!
//! ```text
//!            ┌── reader task ── DeviceEvent::Chunk ──┐
//! Device ────┤                                       ├──> mpsc ──> Gateway
//!            └── writer task <── DeviceReply ── DeviceLink
//! ```
//!
//! The reader task emits [`DeviceEvent::Connected`] before the first chunk
//! of its connection, so consumers always learn about a link before its
//! data. Each transport read is forwarded as one chunk; the device protocol
//! relies on those boundaries.
//!
//! The server does not decide which connection wins. It forwards every
//! connection and leaves single-occupancy to [`ConnectionManager`].
//!
//! # Example
//!
//! ```no_run
//! use intercom_network::{DeviceServer, DeviceServerConfig};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = DeviceServer::bind(DeviceServerConfig::default()).await?;
//! let (events_tx, mut events_rx) = mpsc::channel(64);
//!
//! tokio::spawn(server.run(events_tx));
//!
//! while let Some(event) = events_rx.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`ConnectionManager`]: crate::ConnectionManager

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use intercom_core::constants::DEFAULT_DEVICE_PORT;
use intercom_protocol::{DeviceCodec, DeviceReply};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

use crate::{ConnectionId, DeviceEvent, DeviceLink, NetworkError, Result};

/// Configuration for the device listener
///
/// # Example
///
/// ```
/// use intercom_network::DeviceServerConfig;
///
/// let config = DeviceServerConfig {
///     bind_addr: "127.0.0.1:3001".parse().unwrap(),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DeviceServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
}

impl Default for DeviceServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_DEVICE_PORT)),
        }
    }
}

/// Accepts device connections and forwards their traffic as [`DeviceEvent`]s.
#[derive(Debug)]
pub struct DeviceServer {
    listener: TcpListener,
    next_id: u64,
}

impl DeviceServer {
    /// Bind the listener.
    pub async fn bind(config: DeviceServerConfig) -> Result<Self> {
        info!("Binding device server to {}", config.bind_addr);

        let listener =
            TcpListener::bind(config.bind_addr)
                .await
                .map_err(|source| NetworkError::Bind {
                    addr: config.bind_addr,
                    source,
                })?;

        info!(
            "Device server listening on {}",
            listener.local_addr().unwrap_or(config.bind_addr)
        );

        Ok(Self {
            listener,
            next_id: 1,
        })
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection and start its reader and writer tasks.
    ///
    /// The link is delivered through `events` as [`DeviceEvent::Connected`].
    pub async fn accept(&mut self, events: &mpsc::Sender<DeviceEvent>) -> Result<ConnectionId> {
        let (stream, addr) = self.listener.accept().await?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;

        debug!(connection = %id, addr = %addr, "Accepted device connection");
        spawn_connection(id, addr, stream, events.clone());
        Ok(id)
    }

    /// Accept connections until the event receiver is dropped.
    pub async fn run(mut self, events: mpsc::Sender<DeviceEvent>) -> Result<()> {
        loop {
            tokio::select! {
                _ = events.closed() => {
                    info!("Event consumer gone, stopping device server");
                    return Ok(());
                }
                accepted = self.accept(&events) => {
                    if let Err(e) = accepted {
                        error!(error = %e, "Failed to accept device connection");
                    }
                }
            }
        }
    }
}

fn spawn_connection(
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
    events: mpsc::Sender<DeviceEvent>,
) {
    let (read_half, write_half) = stream.into_split();
    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let link = DeviceLink::new(id, addr, replies_tx, shutdown_tx);

    tokio::spawn(write_replies(id, write_half, replies_rx));
    tokio::spawn(read_chunks(id, link, read_half, shutdown_rx, events));
}

async fn write_replies(
    id: ConnectionId,
    write_half: OwnedWriteHalf,
    mut replies: mpsc::UnboundedReceiver<DeviceReply>,
) {
    let mut sink = FramedWrite::new(write_half, DeviceCodec::new());

    while let Some(reply) = replies.recv().await {
        trace!(connection = %id, reply = %reply, "Writing reply");
        if let Err(e) = sink.send(reply).await {
            warn!(connection = %id, error = %e, "Failed to write to device");
            break;
        }
    }

    // Dropping the write half sends FIN to the device.
    debug!(connection = %id, "Writer task finished");
}

async fn read_chunks(
    id: ConnectionId,
    link: DeviceLink,
    read_half: OwnedReadHalf,
    mut shutdown: oneshot::Receiver<()>,
    events: mpsc::Sender<DeviceEvent>,
) {
    if events.send(DeviceEvent::Connected(link)).await.is_err() {
        return;
    }

    let mut chunks = FramedRead::new(read_half, DeviceCodec::new());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!(connection = %id, "Link closed locally");
                break;
            }
            next = chunks.next() => match next {
                Some(Ok(data)) => {
                    trace!(connection = %id, len = data.len(), "Received chunk");
                    let event = DeviceEvent::Chunk { connection: id, data };
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!(connection = %id, error = %e, "Read error on device connection");
                    break;
                }
                None => {
                    debug!(connection = %id, "Device closed the connection");
                    break;
                }
            }
        }
    }

    let _ = events.send(DeviceEvent::Disconnected { connection: id }).await;
}
