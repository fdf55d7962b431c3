//! Device session handling for the intercom.
//!
//! This crate contains the entry-request workflow: classifying device
//! chunks, keeping the single in-flight [`Session`], notifying reviewers
//! and forwarding their decisions back to the device.
//!
//! # Example
//!
//! ```
//! use intercom_gateway::mock::{MockMessenger, MockRegistrationStore, MockRegistry};
//! use intercom_gateway::{Gateway, GatewayConfig};
//! use intercom_network::{ConnectionId, DeviceLink};
//! use intercom_protocol::DeviceReply;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> intercom_core::Result<()> {
//! let registry = MockRegistry::with_reviewers([(1001, 7)]);
//! let messenger = MockMessenger::new();
//! let mut gateway = Gateway::new(
//!     GatewayConfig::default(),
//!     registry,
//!     MockRegistrationStore::new(),
//!     messenger.clone(),
//! );
//!
//! let (link, mut device) = DeviceLink::channel(ConnectionId::new(1), "127.0.0.1:5000".parse().unwrap());
//! gateway.attach_device(link);
//!
//! gateway.feed_device(&b"start"[..]).await?;
//! gateway.feed_device(&b"42"[..]).await?;
//! assert_eq!(device.try_recv(), Some(DeviceReply::NotFound));
//!
//! gateway.feed_device(&b"start"[..]).await?;
//! gateway.feed_device(&b"7"[..]).await?;
//! assert_eq!(messenger.sent().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod fanout;
pub mod gateway;
pub mod messenger;
pub mod mock;
pub mod registration;
pub mod router;
pub mod session;

pub use actions::ActionOutcome;
pub use fanout::{FanoutReport, Notification, ReviewerFanout};
pub use gateway::{Gateway, GatewayConfig, ReviewerEvent};
pub use messenger::Messenger;
pub use registration::{RegistrationFlow, RegistrationOutcome};
pub use router::{CommandRouter, Dispatch};
pub use session::{PendingCommand, Session};
