//! Long-polling of Bot API updates.
//!
//! Every callback query is answered right away so the client stops its
//! spinner; the decision itself is handled by the gateway. Updates are
//! translated into [`ReviewerEvent`]s:
//!
//! | Update                                    | Event         |
//! |-------------------------------------------|---------------|
//! | callback `photo` / `accept` / `reject`    | `Action`      |
//! | callback `change-unit`                    | `ChangeUnit`  |
//! | text message                              | `Text`        |
//!
//! A failed poll is logged and retried after a fixed pause.

use intercom_core::{CallbackData, MessageRef, ReviewerId};
use intercom_gateway::ReviewerEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::Update;
use crate::client::BotApi;

/// Translate one update into a gateway event.
///
/// Returns `None` for updates the gateway does not care about, including
/// callbacks with unknown data.
pub fn translate(update: &Update) -> Option<ReviewerEvent> {
    if let Some(query) = &update.callback_query {
        let reviewer = ReviewerId::new(query.from.id);
        let data = query.data.as_deref()?;

        return match data.parse::<CallbackData>() {
            Ok(CallbackData::Decision(action)) => {
                let message = query.message.as_ref()?;
                Some(ReviewerEvent::Action {
                    reviewer,
                    action,
                    message: MessageRef::new(ReviewerId::new(message.chat.id), message.message_id),
                })
            }
            Ok(CallbackData::ChangeUnit) => Some(ReviewerEvent::ChangeUnit { reviewer }),
            Err(e) => {
                debug!(reviewer = %reviewer, error = %e, "Ignoring callback");
                None
            }
        };
    }

    let message = update.message.as_ref()?;
    let text = message.text.clone()?;
    Some(ReviewerEvent::Text {
        reviewer: ReviewerId::new(message.chat.id),
        text,
    })
}

/// Feeds Bot API updates to the gateway.
#[derive(Debug)]
pub struct UpdatePoller {
    api: BotApi,
    offset: i64,
}

impl UpdatePoller {
    pub fn new(api: BotApi) -> Self {
        Self { api, offset: 0 }
    }

    /// Offset of the next update to fetch.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Poll until the gateway stops listening.
    pub async fn run(mut self, events: mpsc::Sender<ReviewerEvent>) {
        info!("Polling Bot API updates");

        loop {
            let updates = tokio::select! {
                _ = events.closed() => break,
                polled = self.api.get_updates(self.offset) => polled,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Polling updates failed, retrying");
                    tokio::time::sleep(self.api.config().retry_delay()).await;
                    continue;
                }
            };

            for update in updates {
                self.offset = self.offset.max(update.update_id + 1);

                if let Some(query) = &update.callback_query
                    && let Err(e) = self.api.answer_callback_query(&query.id, None).await
                {
                    warn!(error = %e, "Failed to answer callback query");
                }

                let Some(event) = translate(&update) else {
                    continue;
                };
                if events.send(event).await.is_err() {
                    info!("Gateway gone, stopping poller");
                    return;
                }
            }
        }

        info!("Gateway gone, stopping poller");
    }
}
