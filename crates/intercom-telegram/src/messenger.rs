use bytes::Bytes;
use intercom_core::{Error, Keyboard, MessageRef, Result, ReviewerId};
use intercom_gateway::Messenger;
use tracing::debug;

use crate::api::InlineKeyboardMarkup;
use crate::client::BotApi;

/// [`Messenger`] delivering to Telegram chats; a reviewer id is a chat id.
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    api: BotApi,
}

impl TelegramMessenger {
    pub fn new(api: BotApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &BotApi {
        &self.api
    }
}

impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        reviewer: ReviewerId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.map(InlineKeyboardMarkup::from);
        let message = self
            .api
            .send_message(reviewer.as_i64(), text, markup)
            .await
            .map_err(|e| Error::delivery(reviewer, e.to_string()))?;

        debug!(reviewer = %reviewer, message_id = message.message_id, "Text delivered");
        Ok(MessageRef::new(reviewer, message.message_id))
    }

    async fn send_image(
        &self,
        reviewer: ReviewerId,
        image: Bytes,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.map(InlineKeyboardMarkup::from);
        let message = self
            .api
            .send_photo(reviewer.as_i64(), image, caption, markup)
            .await
            .map_err(|e| Error::delivery(reviewer, e.to_string()))?;

        debug!(reviewer = %reviewer, message_id = message.message_id, "Photo delivered");
        Ok(MessageRef::new(reviewer, message.message_id))
    }

    async fn remove_actions(&self, message: MessageRef) -> Result<()> {
        self.api
            .clear_reply_markup(message.reviewer.as_i64(), message.message_id)
            .await
            .map_err(|e| Error::delivery(message.reviewer, e.to_string()))
    }
}
