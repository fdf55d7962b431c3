//! Device connections and the single-occupant connection manager.
//!
//! Every accepted socket is represented by a [`DeviceLink`]: a handle that
//! queues [`DeviceReply`] tokens for the connection's writer task and keeps
//! the reader task alive. Dropping (or [`closing`](DeviceLink::close)) the
//! link shuts both tasks down and closes the socket.
//!
//! [`ConnectionManager`] tracks at most one link. Attaching a new link hands
//! back the previous occupant so the caller can close it; events carrying
//! a stale [`ConnectionId`] are then recognised with
//! [`ConnectionManager::is_current`] and ignored.
//!
//! ```text
//! accept #1 ──> attach ──> current = #1
//! accept #2 ──> attach ──> current = #2, #1 handed back and closed
//! chunk  #1 ──> is_current(#1) == false ──> ignored
//! ```

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use intercom_protocol::DeviceReply;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{NetworkError, Result};

/// Identifier assigned to every accepted connection, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        ConnectionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Transport events emitted by the device server, in arrival order per
/// connection.
#[derive(Debug)]
pub enum DeviceEvent {
    /// A device connected. Always precedes the connection's chunks.
    Connected(DeviceLink),

    /// One transport read from the device.
    Chunk { connection: ConnectionId, data: Bytes },

    /// The device closed the socket, or its link was dropped.
    Disconnected { connection: ConnectionId },
}

impl DeviceEvent {
    /// Connection this event belongs to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            DeviceEvent::Connected(link) => link.id(),
            DeviceEvent::Chunk { connection, .. } => *connection,
            DeviceEvent::Disconnected { connection } => *connection,
        }
    }
}

/// Handle to one device connection.
#[derive(Debug)]
pub struct DeviceLink {
    id: ConnectionId,
    addr: SocketAddr,
    connected_at: DateTime<Utc>,
    replies: mpsc::UnboundedSender<DeviceReply>,

    /// Dropping the sender stops the reader task.
    _shutdown: oneshot::Sender<()>,
}

impl DeviceLink {
    pub(crate) fn new(
        id: ConnectionId,
        addr: SocketAddr,
        replies: mpsc::UnboundedSender<DeviceReply>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            addr,
            connected_at: Utc::now(),
            replies,
            _shutdown: shutdown,
        }
    }

    /// Create a link backed by in-process channels instead of a socket.
    ///
    /// The returned [`LinkProbe`] observes everything written to the device
    /// and whether the link has been closed.
    pub fn channel(id: ConnectionId, addr: SocketAddr) -> (Self, LinkProbe) {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let link = Self::new(id, addr, replies_tx, shutdown_tx);
        let probe = LinkProbe {
            replies: replies_rx,
            shutdown: shutdown_rx,
        };
        (link, probe)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }

    /// Queue a reply token for the writer task.
    pub fn send(&self, reply: DeviceReply) -> Result<()> {
        self.replies
            .send(reply)
            .map_err(|_| NetworkError::ConnectionClosed(self.id))
    }

    /// Returns `true` while the writer task is still accepting replies.
    pub fn is_open(&self) -> bool {
        !self.replies.is_closed()
    }

    /// Close the connection. Equivalent to dropping the link.
    pub fn close(self) {
        debug!(connection = %self.id, "Closing device link");
    }
}

/// Test-side end of a [`DeviceLink::channel`] link.
#[derive(Debug)]
pub struct LinkProbe {
    replies: mpsc::UnboundedReceiver<DeviceReply>,
    shutdown: oneshot::Receiver<()>,
}

impl LinkProbe {
    /// Next reply written to the device, if one is queued.
    pub fn try_recv(&mut self) -> Option<DeviceReply> {
        self.replies.try_recv().ok()
    }

    /// Every reply queued so far.
    pub fn drain(&mut self) -> Vec<DeviceReply> {
        let mut replies = Vec::new();
        while let Some(reply) = self.try_recv() {
            replies.push(reply);
        }
        replies
    }

    /// Returns `true` once the link has been closed or dropped.
    pub fn is_closed(&mut self) -> bool {
        matches!(
            self.shutdown.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        )
    }
}

/// Tracks the single active device connection.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    current: Option<DeviceLink>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `link` the tracked device.
    ///
    /// Returns the displaced link, if any. The caller is expected to close
    /// it; its later events fail [`is_current`](Self::is_current).
    pub fn attach(&mut self, link: DeviceLink) -> Option<DeviceLink> {
        info!(
            connection = %link.id(),
            addr = %link.remote_addr(),
            "Device connected"
        );

        let previous = self.current.replace(link);
        if let Some(old) = &previous {
            warn!(
                connection = %old.id(),
                uptime_secs = old.uptime().num_seconds(),
                "Replacing previously connected device"
            );
        }
        previous
    }

    /// Forget the tracked link if it is `id`.
    ///
    /// Returns `true` when `id` was the current connection.
    pub fn detach(&mut self, id: ConnectionId) -> bool {
        match &self.current {
            Some(link) if link.id() == id => {
                info!(connection = %id, "Device disconnected");
                self.current = None;
                true
            }
            _ => {
                debug!(connection = %id, "Ignoring disconnect of stale connection");
                false
            }
        }
    }

    pub fn is_current(&self, id: ConnectionId) -> bool {
        self.current.as_ref().is_some_and(|link| link.id() == id)
    }

    pub fn current(&self) -> Option<&DeviceLink> {
        self.current.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    /// Write a reply token to the tracked device.
    ///
    /// A no-op (logged) when no device is connected. A link whose writer has
    /// gone away is dropped and reported as [`SendOutcome::LinkLost`] so the
    /// caller can discard per-stream state.
    pub fn send_to_device(&mut self, reply: DeviceReply) -> SendOutcome {
        let Some(link) = &self.current else {
            warn!(reply = %reply, "No device connected, dropping reply");
            return SendOutcome::NotConnected;
        };

        match link.send(reply) {
            Ok(()) => {
                debug!(connection = %link.id(), reply = %reply, "Reply queued for device");
                SendOutcome::Queued
            }
            Err(e) => {
                let id = link.id();
                warn!(error = %e, reply = %reply, "Device link is closed, dropping it");
                self.current = None;
                SendOutcome::LinkLost(id)
            }
        }
    }
}

/// Result of [`ConnectionManager::send_to_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply is on its way to the device.
    Queued,

    /// Nothing is tracked.
    NotConnected,

    /// The tracked link had closed; it is no longer tracked.
    LinkLost(ConnectionId),
}

impl SendOutcome {
    pub fn is_queued(self) -> bool {
        matches!(self, SendOutcome::Queued)
    }
}
