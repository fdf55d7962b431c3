//! Outbound side of the messaging channel.
//!
//! The gateway talks to reviewers only through [`Messenger`]. The Telegram
//! implementation lives in its own crate; tests use
//! [`MockMessenger`](crate::mock::MockMessenger).

use std::future::Future;

use bytes::Bytes;
use intercom_core::{Keyboard, MessageRef, Result, ReviewerId};

/// Delivery channel to reviewers.
///
/// Failures are reported as [`Error::Delivery`](intercom_core::Error::Delivery)
/// and never retried by callers.
pub trait Messenger: Send + Sync {
    /// Send a text message, optionally with inline buttons.
    fn send_text(
        &self,
        reviewer: ReviewerId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<MessageRef>> + Send;

    /// Send an image with a caption, optionally with inline buttons.
    fn send_image(
        &self,
        reviewer: ReviewerId,
        image: Bytes,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> impl Future<Output = Result<MessageRef>> + Send;

    /// Strip the inline buttons from a previously sent message.
    fn remove_actions(&self, message: MessageRef) -> impl Future<Output = Result<()>> + Send;
}
