//! Reviewer decisions: photo request, accept, reject.
//!
//! A decision is honoured only while a session is active for the unit the
//! reviewer is registered to. Anyone else gets an "inactive session" reply
//! and nothing reaches the device. Handlers never touch the pending
//! command; the device's own confirmation closes the session.

use intercom_core::constants::{
    TEXT_ACK_ACCEPT, TEXT_ACK_PHOTO, TEXT_ACK_REJECT, TEXT_SESSION_INACTIVE,
};
use intercom_core::{MessageRef, ReviewerAction, ReviewerId};
use intercom_protocol::DeviceReply;
use intercom_storage::{RegistrationStore, ReviewerRepository};
use tracing::{error, info, warn};

use crate::gateway::Gateway;
use crate::messenger::Messenger;

/// What became of a reviewer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The token was written to the device.
    Forwarded(DeviceReply),

    /// The token was accepted but no device is connected.
    DeviceUnavailable(DeviceReply),

    /// No session for the reviewer's unit.
    SessionInactive,
}

fn acknowledgement(action: ReviewerAction) -> &'static str {
    match action {
        ReviewerAction::Photo => TEXT_ACK_PHOTO,
        ReviewerAction::Accept => TEXT_ACK_ACCEPT,
        ReviewerAction::Reject => TEXT_ACK_REJECT,
    }
}

impl<R, F, M> Gateway<R, F, M>
where
    R: ReviewerRepository,
    F: RegistrationStore,
    M: Messenger,
{
    /// Handle a decision button pressed by `reviewer` on `message`.
    pub async fn handle_action(
        &mut self,
        reviewer: ReviewerId,
        action: ReviewerAction,
        message: MessageRef,
    ) -> ActionOutcome {
        let unit = match self.fanout.registry().find_unit(reviewer).await {
            Ok(unit) => unit,
            Err(e) => {
                error!(reviewer = %reviewer, error = %e, "Reviewer lookup failed");
                None
            }
        };

        let authorized = unit.is_some_and(|unit| self.session.is_active_for(unit));

        if !authorized {
            warn!(
                reviewer = %reviewer,
                action = %action,
                session = ?self.session.unit(),
                "Decision outside of an active session"
            );
            if let Err(e) = self
                .fanout
                .messenger()
                .send_text(reviewer, TEXT_SESSION_INACTIVE, None)
                .await
            {
                error!(reviewer = %reviewer, error = %e, "Failed to send inactive-session reply");
            }
            return ActionOutcome::SessionInactive;
        }

        if let Err(e) = self.fanout.messenger().remove_actions(message).await {
            warn!(reviewer = %reviewer, error = %e, "Failed to remove buttons");
        }

        let reply = DeviceReply::from(action);
        let forwarded = self.send_to_device(reply);
        info!(reviewer = %reviewer, reply = %reply, forwarded, "Reviewer decision");

        if let Err(e) = self
            .fanout
            .messenger()
            .send_text(reviewer, acknowledgement(action), None)
            .await
        {
            error!(reviewer = %reviewer, error = %e, "Failed to acknowledge decision");
        }

        if forwarded {
            ActionOutcome::Forwarded(reply)
        } else {
            ActionOutcome::DeviceUnavailable(reply)
        }
    }
}
