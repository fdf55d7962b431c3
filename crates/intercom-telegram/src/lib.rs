//! Telegram channel for the intercom gateway.
//!
//! - [`TelegramMessenger`] implements the gateway's
//!   [`Messenger`](intercom_gateway::Messenger) over the Bot API
//! - [`UpdatePoller`] long-polls `getUpdates` and turns button presses and
//!   text messages into [`ReviewerEvent`](intercom_gateway::ReviewerEvent)s
//!
//! # Example
//!
//! ```no_run
//! use intercom_telegram::{BotApi, TelegramConfig, TelegramMessenger, UpdatePoller};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = BotApi::new(TelegramConfig::new("123:token"))?;
//! let messenger = TelegramMessenger::new(api.clone());
//!
//! let (tx, rx) = mpsc::channel(64);
//! tokio::spawn(UpdatePoller::new(api).run(tx));
//! # drop((messenger, rx));
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod messenger;
pub mod poller;

pub use client::BotApi;
pub use config::TelegramConfig;
pub use error::{Result, TelegramError};
pub use messenger::TelegramMessenger;
pub use poller::{UpdatePoller, translate};
