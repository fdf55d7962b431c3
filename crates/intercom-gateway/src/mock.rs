//! In-process collaborators for tests and local runs.
//!
//! The mocks are cheap to clone; clones share state, so a test keeps one
//! handle while the gateway owns another.
//!
//! # Examples
//!
//! ```
//! use intercom_core::ReviewerId;
//! use intercom_gateway::Messenger;
//! use intercom_gateway::mock::MockMessenger;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> intercom_core::Result<()> {
//! let messenger = MockMessenger::new();
//! let observer = messenger.clone();
//!
//! messenger.send_text(ReviewerId::new(1), "hello", None).await?;
//! assert_eq!(observer.sent().len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use intercom_core::{Error, Keyboard, MessageRef, Result, ReviewerId, UnitNumber};
use intercom_storage::{RegistrationStore, ReviewerRepository, StorageError, StorageResult};
use tokio::sync::Barrier;

use crate::messenger::Messenger;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Payload of a recorded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentContent {
    Text(String),
    Image { image: Bytes, caption: String },
}

/// A message accepted by [`MockMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub reviewer: ReviewerId,
    pub content: SentContent,
    pub keyboard: Option<Keyboard>,
    pub message: MessageRef,
}

impl SentMessage {
    /// Text of a text message, `None` for images.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            SentContent::Text(text) => Some(text),
            SentContent::Image { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct MessengerState {
    sent: Vec<SentMessage>,
    removed: Vec<MessageRef>,
    failing: HashSet<ReviewerId>,
}

/// Messenger that records everything it is asked to deliver.
#[derive(Debug, Clone)]
pub struct MockMessenger {
    state: Arc<Mutex<MessengerState>>,
    next_message_id: Arc<AtomicI64>,
    gate: Arc<Mutex<Option<Arc<Barrier>>>>,
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            next_message_id: Arc::new(AtomicI64::new(1)),
            gate: Arc::default(),
        }
    }
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery to `reviewer` fail.
    pub fn fail_for(&self, reviewer: ReviewerId) {
        lock(&self.state).failing.insert(reviewer);
    }

    /// Hold every text and image send until `parties` of them are waiting
    /// at the same time. Sends are released in groups of `parties`.
    pub fn hold_sends_until(&self, parties: usize) {
        *lock(&self.gate) = Some(Arc::new(Barrier::new(parties)));
    }

    /// Messages delivered so far, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.state).sent.clone()
    }

    /// Messages delivered to one reviewer.
    pub fn sent_to(&self, reviewer: ReviewerId) -> Vec<SentMessage> {
        lock(&self.state)
            .sent
            .iter()
            .filter(|m| m.reviewer == reviewer)
            .cloned()
            .collect()
    }

    /// Messages whose buttons were removed.
    pub fn removed(&self) -> Vec<MessageRef> {
        lock(&self.state).removed.clone()
    }

    /// Forget recorded messages, keeping failure settings.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.sent.clear();
        state.removed.clear();
    }

    async fn pass_gate(&self) {
        let gate = lock(&self.gate).clone();
        if let Some(barrier) = gate {
            barrier.wait().await;
        }
    }

    fn record(
        &self,
        reviewer: ReviewerId,
        content: SentContent,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        let mut state = lock(&self.state);
        if state.failing.contains(&reviewer) {
            return Err(Error::delivery(reviewer, "blocked by mock"));
        }

        let message = MessageRef::new(
            reviewer,
            self.next_message_id.fetch_add(1, Ordering::Relaxed),
        );
        state.sent.push(SentMessage {
            reviewer,
            content,
            keyboard: keyboard.cloned(),
            message,
        });
        Ok(message)
    }
}

impl Messenger for MockMessenger {
    async fn send_text(
        &self,
        reviewer: ReviewerId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        self.pass_gate().await;
        self.record(reviewer, SentContent::Text(text.to_string()), keyboard)
    }

    async fn send_image(
        &self,
        reviewer: ReviewerId,
        image: Bytes,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        self.pass_gate().await;
        let content = SentContent::Image {
            image,
            caption: caption.to_string(),
        };
        self.record(reviewer, content, keyboard)
    }

    async fn remove_actions(&self, message: MessageRef) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing.contains(&message.reviewer) {
            return Err(Error::delivery(message.reviewer, "blocked by mock"));
        }
        state.removed.push(message);
        Ok(())
    }
}

/// Unit registry kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    units: Arc<Mutex<HashMap<ReviewerId, UnitNumber>>>,
    failing: Arc<AtomicBool>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with `(reviewer, unit)` pairs.
    pub fn with_reviewers(entries: impl IntoIterator<Item = (i64, u32)>) -> Self {
        let registry = Self::new();
        {
            let mut units = lock(&registry.units);
            for (reviewer, unit) in entries {
                units.insert(ReviewerId::new(reviewer), UnitNumber::new(unit));
            }
        }
        registry
    }

    /// Make every lookup and write fail.
    pub fn fail_lookups(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StorageError::Configuration(
                "mock registry unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl ReviewerRepository for MockRegistry {
    async fn find_unit(&self, reviewer: ReviewerId) -> StorageResult<Option<UnitNumber>> {
        self.check()?;
        Ok(lock(&self.units).get(&reviewer).copied())
    }

    async fn find_reviewers(&self, unit: UnitNumber) -> StorageResult<Vec<ReviewerId>> {
        self.check()?;
        let mut reviewers: Vec<_> = lock(&self.units)
            .iter()
            .filter(|&(_, &u)| u == unit)
            .map(|(&id, _)| id)
            .collect();
        reviewers.sort();
        Ok(reviewers)
    }

    async fn upsert(&self, reviewer: ReviewerId, unit: UnitNumber) -> StorageResult<()> {
        self.check()?;
        lock(&self.units).insert(reviewer, unit);
        Ok(())
    }

    async fn remove(&self, reviewer: ReviewerId) -> StorageResult<()> {
        self.check()?;
        match lock(&self.units).remove(&reviewer) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound {
                entity_type: "Reviewer".to_string(),
                field: "reviewer_id".to_string(),
                value: reviewer.to_string(),
            }),
        }
    }
}

/// Registration flags kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MockRegistrationStore {
    steps: Arc<Mutex<HashMap<ReviewerId, u32>>>,
}

impl MockRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationStore for MockRegistrationStore {
    async fn get_step(&self, reviewer: ReviewerId) -> StorageResult<u32> {
        Ok(lock(&self.steps).get(&reviewer).copied().unwrap_or(0))
    }

    async fn set_step(&self, reviewer: ReviewerId, step: u32) -> StorageResult<()> {
        let mut steps = lock(&self.steps);
        if step == 0 {
            steps.remove(&reviewer);
        } else {
            steps.insert(reviewer, step);
        }
        Ok(())
    }
}
