//! Linking reviewers to units over the messaging channel.
//!
//! The dialogue is driven by a per-reviewer step kept in a
//! [`RegistrationStore`]:
//!
//! ```text
//! step 0, unregistered, any text ──> prompt, step 1
//! step 0, registered, "/start"   ──> menu with "Change unit"
//! "Change unit" pressed          ──> prompt, step 1
//! step 1, "/..."                 ──> abort, step 0
//! step 1, not digits             ──> "digits only" hint, stays at step 1
//! step 1, digits                 ──> upsert unit, step 0, confirmation
//! ```

use intercom_core::constants::{
    TEXT_MENU, TEXT_REGISTER_DIGITS_ONLY, TEXT_REGISTER_DONE, TEXT_REGISTER_PROMPT,
};
use intercom_core::{Keyboard, Result, ReviewerId, UnitNumber};
use intercom_storage::{RegistrationStore, ReviewerRepository};
use tracing::{debug, info};

use crate::messenger::Messenger;

/// Step recorded while a reviewer is expected to type a unit number.
const STEP_AWAITING_UNIT: u32 = 1;

/// Result of handling one reviewer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The reviewer was asked for a unit number.
    Prompted,

    /// A registered reviewer opened the menu.
    Menu,

    /// The reviewer sent a command while registering; the dialogue ended.
    Aborted,

    /// The reply was not a unit number; a hint was sent.
    Rejected,

    /// The reviewer is now linked to the unit.
    Registered(UnitNumber),

    /// Nothing to do for this message.
    Ignored,
}

/// Registration dialogue state machine.
#[derive(Debug, Clone)]
pub struct RegistrationFlow<F> {
    store: F,
}

impl<F: RegistrationStore> RegistrationFlow<F> {
    pub fn new(store: F) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    /// Handle a text message from `reviewer`.
    pub async fn handle_text<R, M>(
        &self,
        registry: &R,
        messenger: &M,
        reviewer: ReviewerId,
        text: &str,
    ) -> Result<RegistrationOutcome>
    where
        R: ReviewerRepository,
        M: Messenger,
    {
        let step = self.store.get_step(reviewer).await?;

        if step == 0 {
            let registered = registry.find_unit(reviewer).await?.is_some();
            if !registered {
                return self.prompt(messenger, reviewer).await;
            }

            if text.trim() == "/start" {
                let keyboard = Keyboard::change_unit();
                messenger
                    .send_text(reviewer, TEXT_MENU, Some(&keyboard))
                    .await?;
                return Ok(RegistrationOutcome::Menu);
            }

            debug!(reviewer = %reviewer, "Ignoring message from registered reviewer");
            return Ok(RegistrationOutcome::Ignored);
        }

        if text.starts_with('/') {
            self.store.set_step(reviewer, 0).await?;
            info!(reviewer = %reviewer, "Registration aborted");
            return Ok(RegistrationOutcome::Aborted);
        }

        let Ok(unit) = text.parse::<UnitNumber>() else {
            messenger
                .send_text(reviewer, TEXT_REGISTER_DIGITS_ONLY, None)
                .await?;
            return Ok(RegistrationOutcome::Rejected);
        };

        registry.upsert(reviewer, unit).await?;
        self.store.set_step(reviewer, 0).await?;
        info!(reviewer = %reviewer, unit = %unit, "Reviewer registered");

        messenger
            .send_text(reviewer, TEXT_REGISTER_DONE, None)
            .await?;
        Ok(RegistrationOutcome::Registered(unit))
    }

    /// Handle a press of the "Change unit" button.
    pub async fn handle_change_unit<M: Messenger>(
        &self,
        messenger: &M,
        reviewer: ReviewerId,
    ) -> Result<RegistrationOutcome> {
        self.prompt(messenger, reviewer).await
    }

    async fn prompt<M: Messenger>(
        &self,
        messenger: &M,
        reviewer: ReviewerId,
    ) -> Result<RegistrationOutcome> {
        self.store.set_step(reviewer, STEP_AWAITING_UNIT).await?;
        messenger
            .send_text(reviewer, TEXT_REGISTER_PROMPT, None)
            .await?;
        debug!(reviewer = %reviewer, "Asked reviewer for a unit number");
        Ok(RegistrationOutcome::Prompted)
    }
}
