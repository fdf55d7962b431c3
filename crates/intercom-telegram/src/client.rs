//! Thin typed wrapper over the Bot API methods the gateway uses.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::api::{
    AnswerCallbackQuery, ApiResponse, EditMessageReplyMarkup, GetUpdates, InlineKeyboardMarkup,
    Message, SendMessage, Update,
};
use crate::config::TelegramConfig;
use crate::error::{Result, TelegramError};

/// Bot API client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BotApi {
    http: Client,
    config: TelegramConfig,
}

impl BotApi {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let request = SendMessage {
            chat_id,
            text,
            reply_markup,
        };
        self.call("sendMessage", &request, None).await
    }

    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo: Bytes,
        caption: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let part = Part::bytes(photo.to_vec())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);
        if let Some(markup) = reply_markup {
            form = form.text("reply_markup", serde_json::to_string(&markup)?);
        }

        let response = self
            .http
            .post(self.config.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        unwrap_response("sendPhoto", response.json().await?)
    }

    /// Replace the inline keyboard of a message with an empty one.
    pub async fn clear_reply_markup(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let request = EditMessageReplyMarkup {
            chat_id,
            message_id,
            reply_markup: InlineKeyboardMarkup::default(),
        };
        // The result is either the edited Message or `true`
        let _: serde_json::Value = self.call("editMessageReplyMarkup", &request, None).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, id: &str, text: Option<&str>) -> Result<()> {
        let request = AnswerCallbackQuery {
            callback_query_id: id,
            text,
        };
        let _: bool = self.call("answerCallbackQuery", &request, None).await?;
        Ok(())
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let request = GetUpdates {
            offset,
            timeout: self.config.poll_timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        // The request must outlive the server-side long-poll
        let timeout = self.config.poll_timeout() + self.config.request_timeout();
        self.call("getUpdates", &request, Some(timeout)).await
    }

    async fn call<P, T>(&self, method: &'static str, params: &P, timeout: Option<Duration>) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        trace!(method, "Bot API call");

        let mut request = self.http.post(self.config.method_url(method)).json(params);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        unwrap_response(method, response.json().await?)
    }
}

fn unwrap_response<T>(method: &'static str, response: ApiResponse<T>) -> Result<T> {
    if !response.ok {
        return Err(TelegramError::Api {
            code: response.error_code.unwrap_or_default(),
            description: response.description.unwrap_or_default(),
        });
    }
    response.result.ok_or(TelegramError::MissingResult(method))
}
