//! Concurrent delivery of one notification to every reviewer of a unit.
//!
//! All sends of a notification are started before any is awaited and the
//! call returns once every send has finished. A failed send is logged and
//! reported; it never stops the others and is never retried.
//!
//! ```text
//! notify_all(reviewers, notification)
//!     ├── send(r1) ──┐
//!     ├── send(r2) ──┼── join_all ──> FanoutReport { delivered, failed }
//!     └── send(r3) ──┘
//! ```

use bytes::Bytes;
use futures::future::join_all;
use intercom_core::{Error, Keyboard, MessageRef, Result, ReviewerId, UnitNumber};
use intercom_storage::ReviewerRepository;
use tracing::{debug, error, info};

use crate::messenger::Messenger;

/// Content delivered to reviewers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Text {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Image {
        image: Bytes,
        caption: String,
        keyboard: Option<Keyboard>,
    },
}

impl Notification {
    pub fn text(text: impl Into<String>) -> Self {
        Notification::Text {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn image(image: Bytes, caption: impl Into<String>) -> Self {
        Notification::Image {
            image,
            caption: caption.into(),
            keyboard: None,
        }
    }

    /// Attach the Photo / Accept / Reject buttons.
    pub fn with_decision_buttons(mut self) -> Self {
        match &mut self {
            Notification::Text { keyboard, .. } | Notification::Image { keyboard, .. } => {
                *keyboard = Some(Keyboard::decision());
            }
        }
        self
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Notification::Text { keyboard, .. } | Notification::Image { keyboard, .. } => {
                keyboard.as_ref()
            }
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Messages that reached their reviewer.
    pub delivered: Vec<MessageRef>,

    /// Reviewers whose send failed, with the error.
    pub failed: Vec<(ReviewerId, Error)>,
}

impl FanoutReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves the reviewers of a unit and delivers notifications to them.
#[derive(Debug, Clone)]
pub struct ReviewerFanout<R, M> {
    registry: R,
    messenger: M,
}

impl<R, M> ReviewerFanout<R, M>
where
    R: ReviewerRepository,
    M: Messenger,
{
    pub fn new(registry: R, messenger: M) -> Self {
        Self {
            registry,
            messenger,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    /// Reviewers registered to `unit`. An empty set is a normal outcome.
    pub async fn resolve(&self, unit: UnitNumber) -> Result<Vec<ReviewerId>> {
        let reviewers = self.registry.find_reviewers(unit).await?;
        debug!(unit = %unit, count = reviewers.len(), "Resolved reviewers");
        Ok(reviewers)
    }

    /// Deliver `notification` to every reviewer concurrently.
    pub async fn notify_all(
        &self,
        reviewers: &[ReviewerId],
        notification: &Notification,
    ) -> FanoutReport {
        let sends = reviewers
            .iter()
            .map(|&reviewer| self.deliver(reviewer, notification));
        let results = join_all(sends).await;

        let mut report = FanoutReport::default();
        for (&reviewer, result) in reviewers.iter().zip(results) {
            match result {
                Ok(message) => report.delivered.push(message),
                Err(e) => {
                    error!(reviewer = %reviewer, error = %e, "Failed to notify reviewer");
                    report.failed.push((reviewer, e));
                }
            }
        }

        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Notification fan-out finished"
        );
        report
    }

    /// Resolve the reviewers of `unit` and notify all of them.
    pub async fn notify_unit(
        &self,
        unit: UnitNumber,
        notification: &Notification,
    ) -> Result<FanoutReport> {
        let reviewers = self.resolve(unit).await?;
        Ok(self.notify_all(&reviewers, notification).await)
    }

    async fn deliver(&self, reviewer: ReviewerId, notification: &Notification) -> Result<MessageRef> {
        match notification {
            Notification::Text { text, keyboard } => {
                self.messenger
                    .send_text(reviewer, text, keyboard.as_ref())
                    .await
            }
            Notification::Image {
                image,
                caption,
                keyboard,
            } => {
                self.messenger
                    .send_image(reviewer, image.clone(), caption, keyboard.as_ref())
                    .await
            }
        }
    }
}
