//! The owning component of the device session.
//!
//! [`Gateway`] holds every piece of mutable state (session, frame decoder,
//! tracked device connection) and processes one event at a time:
//!
//! ```text
//! DeviceServer ── DeviceEvent ───┐
//!                                ├──> Gateway::run ──> handlers ──> Messenger / device
//! UpdatePoller ── ReviewerEvent ─┘
//! ```
//!
//! Device chunks of one connection are handled in arrival order. There is
//! no ordering between device and reviewer events.

use std::net::SocketAddr;

use bytes::Bytes;
use intercom_core::constants::{
    DEFAULT_MAX_IMAGE_SIZE, TEXT_ENTRY_CANCELLED, TEXT_ENTRY_DENIED, TEXT_ENTRY_GRANTED,
    TEXT_PHOTO_CAPTION, visitor_announcement,
};
use intercom_core::{Error, MessageRef, Result, ReviewerAction, ReviewerId, UnitNumber};
use intercom_network::{ConnectionId, ConnectionManager, DeviceEvent, DeviceLink, SendOutcome};
use intercom_protocol::{DeviceCommand, DeviceReply, FrameDecoder};
use intercom_storage::{RegistrationStore, ReviewerRepository};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::fanout::{Notification, ReviewerFanout};
use crate::messenger::Messenger;
use crate::registration::RegistrationFlow;
use crate::router::{CommandRouter, Dispatch};
use crate::session::{PendingCommand, Session};

/// Behaviour switches of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Largest image length accepted in a frame header.
    pub max_image_size: usize,

    /// Run `accept_ok` / `reject_ok` / `cancel` on the token instead of
    /// waiting for the chunk that follows it.
    pub confirm_on_token: bool,

    /// Drop the session and decoder state when the device goes away.
    pub reset_on_disconnect: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            confirm_on_token: false,
            reset_on_disconnect: true,
        }
    }
}

/// Input from the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewerEvent {
    /// A decision button was pressed on `message`.
    Action {
        reviewer: ReviewerId,
        action: ReviewerAction,
        message: MessageRef,
    },

    /// The "Change unit" button was pressed.
    ChangeUnit { reviewer: ReviewerId },

    /// A plain text message.
    Text { reviewer: ReviewerId, text: String },
}

impl ReviewerEvent {
    pub fn reviewer(&self) -> ReviewerId {
        match self {
            ReviewerEvent::Action { reviewer, .. }
            | ReviewerEvent::ChangeUnit { reviewer }
            | ReviewerEvent::Text { reviewer, .. } => *reviewer,
        }
    }
}

/// Device session handler.
#[derive(Debug)]
pub struct Gateway<R, F, M> {
    pub(crate) config: GatewayConfig,
    pub(crate) session: Session,
    pub(crate) router: CommandRouter,
    pub(crate) decoder: FrameDecoder,
    pub(crate) connections: ConnectionManager,
    pub(crate) fanout: ReviewerFanout<R, M>,
    pub(crate) registration: RegistrationFlow<F>,
}

impl<R, F, M> Gateway<R, F, M>
where
    R: ReviewerRepository,
    F: RegistrationStore,
    M: Messenger,
{
    pub fn new(config: GatewayConfig, registry: R, flags: F, messenger: M) -> Self {
        Self {
            router: CommandRouter::new(config.confirm_on_token),
            decoder: FrameDecoder::with_max_frame_size(config.max_image_size),
            session: Session::new(),
            connections: ConnectionManager::new(),
            fanout: ReviewerFanout::new(registry, messenger),
            registration: RegistrationFlow::new(flags),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn registry(&self) -> &R {
        self.fanout.registry()
    }

    pub fn messenger(&self) -> &M {
        self.fanout.messenger()
    }

    /// Process events until both inputs are closed.
    pub async fn run(
        mut self,
        mut devices: mpsc::Receiver<DeviceEvent>,
        mut reviewers: mpsc::Receiver<ReviewerEvent>,
    ) {
        info!("Gateway started");

        loop {
            tokio::select! {
                Some(event) = devices.recv() => self.handle_device_event(event).await,
                Some(event) = reviewers.recv() => self.handle_reviewer_event(event).await,
                else => break,
            }
        }

        info!("All event sources closed, gateway stopping");
    }

    pub async fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected(link) => self.on_connected(link),
            DeviceEvent::Chunk { connection, data } => self.on_chunk(connection, data).await,
            DeviceEvent::Disconnected { connection } => self.on_disconnected(connection),
        }
    }

    pub async fn handle_reviewer_event(&mut self, event: ReviewerEvent) {
        let reviewer = event.reviewer();

        let result = match event {
            ReviewerEvent::Action {
                reviewer,
                action,
                message,
            } => {
                self.handle_action(reviewer, action, message).await;
                return;
            }
            ReviewerEvent::ChangeUnit { reviewer } => {
                self.registration
                    .handle_change_unit(self.fanout.messenger(), reviewer)
                    .await
            }
            ReviewerEvent::Text { reviewer, text } => {
                self.registration
                    .handle_text(
                        self.fanout.registry(),
                        self.fanout.messenger(),
                        reviewer,
                        &text,
                    )
                    .await
            }
        };

        match result {
            Ok(outcome) => trace!(reviewer = %reviewer, outcome = ?outcome, "Registration step"),
            Err(e) => error!(reviewer = %reviewer, error = %e, "Registration failed"),
        }
    }

    fn on_connected(&mut self, link: DeviceLink) {
        if let Some(displaced) = self.connections.attach(link) {
            displaced.close();
            self.reset_stream_state("device replaced");
        }
    }

    fn on_disconnected(&mut self, connection: ConnectionId) {
        if self.connections.detach(connection) {
            self.reset_stream_state("device disconnected");
        }
    }

    /// Apply the disconnect policy after losing the tracked device.
    fn reset_stream_state(&mut self, reason: &str) {
        // A half-received command never continues on another stream.
        self.session.set_pending(PendingCommand::Idle);
        self.decoder.reset();

        if self.config.reset_on_disconnect
            && let Some(unit) = self.session.close()
        {
            warn!(unit = %unit, reason, "Session dropped with the device connection");
        }
    }

    async fn on_chunk(&mut self, connection: ConnectionId, data: Bytes) {
        if !self.connections.is_current(connection) {
            debug!(connection = %connection, len = data.len(), "Ignoring chunk from stale connection");
            return;
        }

        match self.router.route(&mut self.session, &data) {
            Ok(Dispatch::Armed(DeviceCommand::Photo)) => {
                self.decoder.reset();
                debug!("Photo transfer starting");
            }
            Ok(Dispatch::Armed(command)) => debug!(command = %command, "Awaiting payload"),
            Ok(Dispatch::Run(command, payload)) => self.run_command(command, payload).await,
            Ok(Dispatch::Ignored) => trace!("Ignoring whitespace chunk"),
            Err(e) => warn!(connection = %connection, error = %e, "Protocol error"),
        }
    }

    async fn run_command(&mut self, command: DeviceCommand, payload: &[u8]) {
        match command {
            DeviceCommand::Start => self.handle_start(payload).await,
            DeviceCommand::Photo => self.handle_photo(payload).await,
            DeviceCommand::AcceptOk => self.finish_session(TEXT_ENTRY_GRANTED).await,
            DeviceCommand::RejectOk => self.finish_session(TEXT_ENTRY_DENIED).await,
            DeviceCommand::Cancel => {
                self.decoder.reset();
                self.finish_session(TEXT_ENTRY_CANCELLED).await;
            }
        }
    }

    /// `start`: resolve the announced unit and notify its reviewers.
    async fn handle_start(&mut self, payload: &[u8]) {
        self.session.set_pending(PendingCommand::Idle);

        let unit = match parse_unit(payload) {
            Ok(unit) => unit,
            Err(e) => {
                warn!(error = %e, "Invalid unit number from device");
                self.reply_not_found();
                return;
            }
        };

        let reviewers = match self.fanout.resolve(unit).await {
            Ok(reviewers) => reviewers,
            Err(e) => {
                error!(unit = %unit, error = %e, "Reviewer lookup failed");
                self.reply_not_found();
                return;
            }
        };

        if reviewers.is_empty() {
            info!(unit = %unit, "No reviewers registered for unit");
            self.reply_not_found();
            return;
        }

        if let Some(previous) = self.session.open(unit) {
            warn!(previous = %previous, unit = %unit, "New visitor overwrites the active session");
        }
        info!(unit = %unit, reviewers = reviewers.len(), "Entry request opened");

        let notification = Notification::text(visitor_announcement(unit)).with_decision_buttons();
        self.fanout.notify_all(&reviewers, &notification).await;
    }

    /// `photo`: feed the decoder and deliver the first complete image.
    async fn handle_photo(&mut self, payload: &[u8]) {
        if let Err(e) = self.decoder.feed(payload) {
            warn!(error = %e, "Dropping image transfer");
            self.session.set_pending(PendingCommand::Idle);
            return;
        }

        let Some(image) = self.decoder.next_frame() else {
            trace!(pending = self.decoder.bytes_pending(), "Image incomplete");
            return;
        };

        self.decoder.reset();
        self.session.set_pending(PendingCommand::Idle);

        let Some(unit) = self.session.unit() else {
            warn!(len = image.len(), "Image received without an active session");
            return;
        };

        debug!(unit = %unit, len = image.len(), "Image complete");
        let notification = Notification::image(image, TEXT_PHOTO_CAPTION).with_decision_buttons();
        if let Err(e) = self.fanout.notify_unit(unit, &notification).await {
            error!(unit = %unit, error = %e, "Reviewer lookup failed");
        }
    }

    /// `accept_ok` / `reject_ok` / `cancel`: report the outcome and close.
    async fn finish_session(&mut self, outcome: &str) {
        let open_secs = self.session.age().map(|age| age.num_seconds());
        let Some(unit) = self.session.reset() else {
            warn!(outcome, "Confirmation without an active session");
            return;
        };

        info!(unit = %unit, outcome, open_secs = ?open_secs, "Entry request closed");
        if let Err(e) = self
            .fanout
            .notify_unit(unit, &Notification::text(outcome))
            .await
        {
            error!(unit = %unit, error = %e, "Reviewer lookup failed");
        }
    }

    fn reply_not_found(&mut self) {
        if let Some(unit) = self.session.close() {
            debug!(unit = %unit, "Session cleared by not_found");
        }
        self.send_to_device(DeviceReply::NotFound);
    }

    /// Write `reply` to the device. Returns `true` if it was queued.
    ///
    /// A link found dead here never delivers its `Disconnected` to a tracked
    /// connection, so the stream state is reset now.
    pub(crate) fn send_to_device(&mut self, reply: DeviceReply) -> bool {
        match self.connections.send_to_device(reply) {
            SendOutcome::Queued => true,
            SendOutcome::NotConnected => false,
            SendOutcome::LinkLost(connection) => {
                debug!(connection = %connection, "Device link lost on write");
                self.reset_stream_state("device link lost");
                false
            }
        }
    }

    /// Attach a device link directly, bypassing the event queue.
    pub fn attach_device(&mut self, link: DeviceLink) {
        self.on_connected(link);
    }

    /// Feed one chunk as if it came from the tracked device.
    ///
    /// Returns [`Error::DeviceNotConnected`] when nothing is attached.
    pub async fn feed_device(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let connection = self
            .connections
            .current()
            .map(DeviceLink::id)
            .ok_or(Error::DeviceNotConnected)?;
        self.on_chunk(connection, data.into()).await;
        Ok(())
    }

    /// Remote address of the tracked device, if any.
    pub fn device_addr(&self) -> Option<SocketAddr> {
        self.connections.current().map(DeviceLink::remote_addr)
    }
}

fn parse_unit(payload: &[u8]) -> Result<UnitNumber> {
    std::str::from_utf8(payload)
        .map_err(|_| Error::InvalidUnitNumber(String::from_utf8_lossy(payload).into_owned()))?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"42", 42)]
    #[case(b"7\n", 7)]
    #[case(b" 105 ", 105)]
    fn test_parse_unit(#[case] payload: &[u8], #[case] expected: u32) {
        assert_eq!(parse_unit(payload).unwrap(), UnitNumber::new(expected));
    }

    #[rstest]
    #[case(b"")]
    #[case(b"4x")]
    #[case(&[0xff, 0xfe])]
    fn test_parse_unit_invalid(#[case] payload: &[u8]) {
        assert!(matches!(
            parse_unit(payload),
            Err(Error::InvalidUnitNumber(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_image_size, DEFAULT_MAX_IMAGE_SIZE);
        assert!(!config.confirm_on_token);
        assert!(config.reset_on_disconnect);
    }

    #[test]
    fn test_config_partial_deserialize() {
        let config: GatewayConfig = serde_json::from_str(r#"{"confirm_on_token": true}"#).unwrap();
        assert!(config.confirm_on_token);
        assert!(config.reset_on_disconnect);
    }
}
