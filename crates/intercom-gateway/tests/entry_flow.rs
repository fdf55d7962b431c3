//! End-to-end entry requests against in-process collaborators.

use std::net::SocketAddr;

use bytes::Bytes;
use intercom_core::constants::{
    TEXT_ACK_ACCEPT, TEXT_ENTRY_CANCELLED, TEXT_ENTRY_GRANTED, TEXT_PHOTO_CAPTION,
    TEXT_SESSION_INACTIVE, visitor_announcement,
};
use intercom_core::{Keyboard, MessageRef, ReviewerAction, ReviewerId, UnitNumber};
use intercom_gateway::mock::{MockMessenger, MockRegistrationStore, MockRegistry, SentContent};
use intercom_gateway::{ActionOutcome, Gateway, GatewayConfig, PendingCommand, ReviewerEvent};
use intercom_network::{ConnectionId, DeviceEvent, DeviceLink, LinkProbe};
use intercom_protocol::{DeviceReply, encode_frame};
use tokio::sync::mpsc;

type TestGateway = Gateway<MockRegistry, MockRegistrationStore, MockMessenger>;

struct Harness {
    gateway: TestGateway,
    messenger: MockMessenger,
    device: LinkProbe,
}

fn device_addr() -> SocketAddr {
    SocketAddr::from(([192, 168, 1, 50], 51000))
}

impl Harness {
    fn new(config: GatewayConfig, reviewers: &[(i64, u32)]) -> Self {
        let messenger = MockMessenger::new();
        let mut gateway = Gateway::new(
            config,
            MockRegistry::with_reviewers(reviewers.iter().copied()),
            MockRegistrationStore::new(),
            messenger.clone(),
        );

        let (link, device) = DeviceLink::channel(ConnectionId::new(1), device_addr());
        gateway.attach_device(link);

        Self {
            gateway,
            messenger,
            device,
        }
    }

    fn with_reviewers(reviewers: &[(i64, u32)]) -> Self {
        Self::new(GatewayConfig::default(), reviewers)
    }

    async fn chunk(&mut self, data: &[u8]) {
        self.gateway
            .feed_device(Bytes::copy_from_slice(data))
            .await
            .unwrap();
    }

    async fn start(&mut self, unit: &str) {
        self.chunk(b"start").await;
        self.chunk(unit.as_bytes()).await;
    }

    async fn press(&mut self, reviewer: i64, action: ReviewerAction, message: MessageRef) -> ActionOutcome {
        self.gateway
            .handle_action(ReviewerId::new(reviewer), action, message)
            .await
    }

    /// Message reference of the last message sent to `reviewer`.
    fn last_message(&self, reviewer: i64) -> MessageRef {
        self.messenger
            .sent_to(ReviewerId::new(reviewer))
            .last()
            .expect("reviewer received a message")
            .message
    }
}

#[tokio::test]
async fn test_unknown_unit_then_known_unit() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);

    h.start("42").await;
    assert_eq!(h.device.drain(), vec![DeviceReply::NotFound]);
    assert!(!h.gateway.session().is_active());
    assert!(h.messenger.sent().is_empty());

    h.start("7").await;
    assert!(h.device.drain().is_empty());
    assert_eq!(h.gateway.session().unit(), Some(UnitNumber::new(7)));

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reviewer, ReviewerId::new(1));
    assert_eq!(sent[0].text(), Some(visitor_announcement(7).as_str()));
    assert_eq!(sent[0].keyboard, Some(Keyboard::decision()));
    assert_eq!(sent[0].keyboard.as_ref().unwrap().buttons.len(), 3);
}

#[tokio::test]
async fn test_start_notifies_every_reviewer_once() {
    let mut h = Harness::with_reviewers(&[(1, 7), (2, 7), (3, 9)]);

    h.start("7").await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(h.messenger.sent_to(ReviewerId::new(1)).len(), 1);
    assert_eq!(h.messenger.sent_to(ReviewerId::new(2)).len(), 1);
    assert!(h.messenger.sent_to(ReviewerId::new(3)).is_empty());
    assert_eq!(sent[0].keyboard, sent[1].keyboard);
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
}

#[tokio::test]
async fn test_invalid_unit_payload_is_not_found() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);

    h.start("7a").await;
    assert_eq!(h.device.drain(), vec![DeviceReply::NotFound]);
    assert!(h.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_does_not_stop_fanout() {
    let mut h = Harness::with_reviewers(&[(1, 7), (2, 7), (3, 7)]);
    h.messenger.fail_for(ReviewerId::new(1));

    h.start("7").await;

    let recipients: Vec<_> = h.messenger.sent().iter().map(|m| m.reviewer).collect();
    assert_eq!(recipients, vec![ReviewerId::new(2), ReviewerId::new(3)]);
    assert!(h.gateway.session().is_active());
}

#[tokio::test]
async fn test_accept_from_other_unit_is_rejected() {
    let mut h = Harness::with_reviewers(&[(1, 7), (2, 8)]);
    h.start("7").await;
    let message = h.last_message(1);
    h.messenger.clear();

    let outcome = h.press(2, ReviewerAction::Accept, message).await;

    assert_eq!(outcome, ActionOutcome::SessionInactive);
    assert!(h.device.drain().is_empty());
    let replies = h.messenger.sent_to(ReviewerId::new(2));
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text(), Some(TEXT_SESSION_INACTIVE));
    assert!(h.messenger.removed().is_empty());
}

#[tokio::test]
async fn test_action_from_unregistered_reviewer_is_rejected() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);
    h.start("7").await;
    let message = h.last_message(1);

    let outcome = h.press(99, ReviewerAction::Photo, message).await;
    assert_eq!(outcome, ActionOutcome::SessionInactive);
    assert!(h.device.drain().is_empty());
}

#[tokio::test]
async fn test_action_without_session_is_rejected() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);
    let message = MessageRef::new(ReviewerId::new(1), 1);

    let outcome = h.press(1, ReviewerAction::Accept, message).await;
    assert_eq!(outcome, ActionOutcome::SessionInactive);
    assert!(h.device.drain().is_empty());
}

#[tokio::test]
async fn test_accept_round_trip() {
    let mut h = Harness::with_reviewers(&[(1, 7), (2, 7)]);
    h.start("7").await;
    let message = h.last_message(1);
    h.messenger.clear();

    let outcome = h.press(1, ReviewerAction::Accept, message).await;
    assert_eq!(outcome, ActionOutcome::Forwarded(DeviceReply::Accept));
    assert_eq!(h.device.drain(), vec![DeviceReply::Accept]);
    assert_eq!(h.messenger.removed(), vec![message]);
    assert_eq!(
        h.messenger.sent_to(ReviewerId::new(1))[0].text(),
        Some(TEXT_ACK_ACCEPT)
    );

    // Decisions do not advance the pending command or close the session
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
    assert!(h.gateway.session().is_active());
    h.messenger.clear();

    h.chunk(b"accept_ok").await;
    assert!(h.messenger.sent().is_empty(), "waits for the trailing chunk");
    assert_eq!(
        h.gateway.session().pending(),
        PendingCommand::AwaitingAcceptConfirm
    );

    h.chunk(b"\n").await;
    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.text() == Some(TEXT_ENTRY_GRANTED)));
    assert!(sent.iter().all(|m| m.keyboard.is_none()));
    assert!(!h.gateway.session().is_active());
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
}

#[tokio::test]
async fn test_confirmation_on_token() {
    let config = GatewayConfig {
        confirm_on_token: true,
        ..GatewayConfig::default()
    };
    let mut h = Harness::new(config, &[(1, 7)]);
    h.start("7").await;
    h.messenger.clear();

    h.chunk(b"reject_ok").await;
    assert_eq!(h.messenger.sent().len(), 1);
    assert!(!h.gateway.session().is_active());

    // Trailing newline is dropped quietly
    h.chunk(b"\n").await;
    assert_eq!(h.messenger.sent().len(), 1);
}

#[tokio::test]
async fn test_cancel_resets_and_next_start_is_clean() {
    let mut h = Harness::with_reviewers(&[(1, 7), (2, 7), (3, 5)]);
    h.start("7").await;

    // A photo transfer is interrupted half-way
    h.chunk(b"photo").await;
    let frame = encode_frame(&[0xAB; 64]);
    h.chunk(&frame[..10]).await;
    assert!(!h.gateway.decoder().is_empty());
    h.messenger.clear();

    h.chunk(b"cancel").await;
    h.chunk(b"\n").await;

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.text() == Some(TEXT_ENTRY_CANCELLED)));
    assert_eq!(h.messenger.sent_to(ReviewerId::new(1)).len(), 1);
    assert_eq!(h.messenger.sent_to(ReviewerId::new(2)).len(), 1);
    assert!(!h.gateway.session().is_active());
    assert!(h.gateway.decoder().is_empty());
    h.messenger.clear();

    h.start("5").await;
    assert_eq!(h.gateway.session().unit(), Some(UnitNumber::new(5)));
    assert_eq!(h.messenger.sent().len(), 1);
    assert!(h.device.drain().is_empty());
}

#[tokio::test]
async fn test_confirmation_without_session_is_harmless() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);

    h.chunk(b"accept_ok").await;
    h.chunk(b"\n").await;

    assert!(h.messenger.sent().is_empty());
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
}

#[tokio::test]
async fn test_photo_request_and_delivery() {
    let mut h = Harness::with_reviewers(&[(1, 7), (2, 7)]);
    h.start("7").await;
    let message = h.last_message(2);
    h.messenger.clear();

    let outcome = h.press(2, ReviewerAction::Photo, message).await;
    assert_eq!(outcome, ActionOutcome::Forwarded(DeviceReply::Photo));
    assert_eq!(h.device.drain(), vec![DeviceReply::Photo]);
    h.messenger.clear();

    let image: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    let frame = encode_frame(&image);

    h.chunk(b"photo").await;
    // Split inside the header and across the payload
    for piece in [&frame[..2], &frame[2..700], &frame[700..]] {
        h.chunk(piece).await;
    }

    let sent = h.messenger.sent();
    assert_eq!(sent.len(), 2);
    for message in &sent {
        assert_eq!(
            message.content,
            SentContent::Image {
                image: Bytes::from(image.clone()),
                caption: TEXT_PHOTO_CAPTION.to_string(),
            }
        );
        assert_eq!(message.keyboard, Some(Keyboard::decision()));
    }
    assert!(h.gateway.decoder().is_empty());
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
    assert!(h.gateway.session().is_active());
}

#[tokio::test]
async fn test_oversized_frame_is_dropped() {
    let config = GatewayConfig {
        max_image_size: 16,
        ..GatewayConfig::default()
    };
    let mut h = Harness::new(config, &[(1, 7)]);
    h.start("7").await;
    h.messenger.clear();

    h.chunk(b"photo").await;
    h.chunk(&encode_frame(&[0u8; 32])).await;

    assert!(h.messenger.sent().is_empty());
    assert!(h.gateway.decoder().is_empty());
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
}

#[tokio::test]
async fn test_stray_payload_is_ignored() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);

    h.chunk(b"hello").await;

    assert!(h.device.drain().is_empty());
    assert!(h.messenger.sent().is_empty());
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);
}

#[tokio::test]
async fn test_disconnect_resets_session() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);
    h.start("7").await;
    h.chunk(b"photo").await;

    h.gateway
        .handle_device_event(DeviceEvent::Disconnected {
            connection: ConnectionId::new(1),
        })
        .await;

    assert!(!h.gateway.connections().is_connected());
    assert!(!h.gateway.session().is_active());
    assert_eq!(h.gateway.session().pending(), PendingCommand::Idle);

    // Decisions now find no session
    let message = h.last_message(1);
    assert_eq!(
        h.press(1, ReviewerAction::Accept, message).await,
        ActionOutcome::SessionInactive
    );
}

#[tokio::test]
async fn test_disconnect_keeps_session_when_configured() {
    let config = GatewayConfig {
        reset_on_disconnect: false,
        ..GatewayConfig::default()
    };
    let mut h = Harness::new(config, &[(1, 7)]);
    h.start("7").await;

    h.gateway
        .handle_device_event(DeviceEvent::Disconnected {
            connection: ConnectionId::new(1),
        })
        .await;
    assert!(h.gateway.session().is_active());

    let message = h.last_message(1);
    assert_eq!(
        h.press(1, ReviewerAction::Accept, message).await,
        ActionOutcome::DeviceUnavailable(DeviceReply::Accept)
    );
}

#[tokio::test]
async fn test_dead_link_on_write_resets_stream_state() {
    let messenger = MockMessenger::new();
    let mut gateway: TestGateway = Gateway::new(
        GatewayConfig::default(),
        MockRegistry::with_reviewers([(1, 7)]),
        MockRegistrationStore::new(),
        messenger.clone(),
    );
    let (link, device) = DeviceLink::channel(ConnectionId::new(1), device_addr());
    gateway.attach_device(link);

    let partial_frame: &[u8] = &[0, 0, 0, 10, 1, 2];
    for data in [&b"start"[..], &b"7"[..], &b"photo"[..], partial_frame] {
        gateway.feed_device(Bytes::copy_from_slice(data)).await.unwrap();
    }
    assert_eq!(gateway.session().pending(), PendingCommand::AwaitingPhoto);

    // The writer side is gone before the reader reports the hangup
    drop(device);
    let message = messenger
        .sent_to(ReviewerId::new(1))
        .last()
        .expect("reviewer was notified")
        .message;
    let outcome = gateway
        .handle_action(ReviewerId::new(1), ReviewerAction::Photo, message)
        .await;
    assert_eq!(outcome, ActionOutcome::DeviceUnavailable(DeviceReply::Photo));

    gateway
        .handle_device_event(DeviceEvent::Disconnected {
            connection: ConnectionId::new(1),
        })
        .await;

    assert!(!gateway.connections().is_connected());
    assert!(!gateway.session().is_active());
    assert_eq!(gateway.session().pending(), PendingCommand::Idle);
    assert!(gateway.decoder().is_empty());
    assert_eq!(gateway.decoder().bytes_pending(), 0);

    // The next device never continues the old image
    let (link, mut next) = DeviceLink::channel(ConnectionId::new(2), device_addr());
    gateway
        .handle_device_event(DeviceEvent::Connected(link))
        .await;
    messenger.clear();
    gateway
        .feed_device(Bytes::from_static(&[3, 4, 5, 6, 7, 8, 9, 10]))
        .await
        .unwrap();

    assert!(gateway.decoder().is_empty());
    assert!(messenger.sent().is_empty());
    assert!(next.drain().is_empty());
}

#[tokio::test]
async fn test_replacement_device_takes_over() {
    let mut h = Harness::with_reviewers(&[(1, 7)]);

    let (link, mut second) = DeviceLink::channel(ConnectionId::new(2), device_addr());
    h.gateway
        .handle_device_event(DeviceEvent::Connected(link))
        .await;
    assert!(h.device.is_closed());

    // Chunks of the displaced connection are ignored
    for data in [&b"start"[..], &b"42"[..]] {
        h.gateway
            .handle_device_event(DeviceEvent::Chunk {
                connection: ConnectionId::new(1),
                data: Bytes::from_static(data),
            })
            .await;
    }
    assert!(second.drain().is_empty());

    // A late disconnect of the old link does not drop the new one
    h.gateway
        .handle_device_event(DeviceEvent::Disconnected {
            connection: ConnectionId::new(1),
        })
        .await;
    assert!(h.gateway.connections().is_current(ConnectionId::new(2)));

    h.start("42").await;
    assert_eq!(second.drain(), vec![DeviceReply::NotFound]);
}

#[tokio::test]
async fn test_run_loop_serializes_both_sources() {
    let messenger = MockMessenger::new();
    let gateway = Gateway::new(
        GatewayConfig::default(),
        MockRegistry::with_reviewers([(1, 7)]),
        MockRegistrationStore::new(),
        messenger.clone(),
    );

    let (device_tx, device_rx) = mpsc::channel(16);
    let (reviewer_tx, reviewer_rx) = mpsc::channel(16);
    let handle = tokio::spawn(gateway.run(device_rx, reviewer_rx));

    let (link, mut device) = DeviceLink::channel(ConnectionId::new(1), device_addr());
    device_tx.send(DeviceEvent::Connected(link)).await.unwrap();
    for data in [&b"start"[..], &b"7"[..]] {
        device_tx
            .send(DeviceEvent::Chunk {
                connection: ConnectionId::new(1),
                data: Bytes::from_static(data),
            })
            .await
            .unwrap();
    }
    drop(device_tx);

    // Wait for the announcement before pressing a button
    let message = loop {
        if let Some(sent) = messenger.sent().first() {
            break sent.message;
        }
        tokio::task::yield_now().await;
    };

    reviewer_tx
        .send(ReviewerEvent::Action {
            reviewer: ReviewerId::new(1),
            action: ReviewerAction::Reject,
            message,
        })
        .await
        .unwrap();
    drop(reviewer_tx);

    handle.await.unwrap();
    assert_eq!(device.drain(), vec![DeviceReply::Reject]);
}

#[tokio::test]
async fn test_registration_through_events() {
    let messenger = MockMessenger::new();
    let registry = MockRegistry::new();
    let mut gateway = Gateway::new(
        GatewayConfig::default(),
        registry.clone(),
        MockRegistrationStore::new(),
        messenger.clone(),
    );

    let reviewer = ReviewerId::new(55);
    for text in ["/start", "12"] {
        gateway
            .handle_reviewer_event(ReviewerEvent::Text {
                reviewer,
                text: text.to_string(),
            })
            .await;
    }

    let (link, _device) = DeviceLink::channel(ConnectionId::new(1), device_addr());
    gateway.attach_device(link);
    gateway.feed_device(&b"start"[..]).await.unwrap();
    gateway.feed_device(&b"12"[..]).await.unwrap();

    assert_eq!(gateway.session().unit(), Some(UnitNumber::new(12)));
    let last = messenger.sent().pop().unwrap();
    assert_eq!(last.reviewer, reviewer);
    assert_eq!(last.content, SentContent::Text(visitor_announcement(12)));
}
