//! Wiring of the intercom gateway service.
//!
//! The `intercomd` binary loads [`AppConfig`], installs the tracing
//! subscriber and runs the device server, the Bot API poller and the
//! gateway on one runtime.

pub mod config;
pub mod telemetry;

pub use config::{AppConfig, DatabaseSection, DeviceSection, GatewaySection};
