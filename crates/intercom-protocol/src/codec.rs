//! Tokio codec for the device link.
//!
//! The device protocol has no delimiters: meaning is carried by transport
//! chunk boundaries (a command token arrives as its own chunk, followed by
//! its payload). `DeviceCodec` therefore hands every read to the caller as
//! one chunk, unmodified, and leaves classification to the command router.
//!
//! # Architecture
//!
//! ```text
//! TCP Stream -> Decoder -> Bytes (one chunk per read)
//! DeviceReply -> Encoder -> TCP Stream (bare token)
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//! use intercom_protocol::{DeviceCodec, DeviceReply};
//! use futures::{SinkExt, StreamExt};
//!
//! # async fn example() -> intercom_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:3001").await?;
//! let mut framed = Framed::new(stream, DeviceCodec::new());
//!
//! framed.send(DeviceReply::Photo).await?;
//!
//! if let Some(Ok(chunk)) = framed.next().await {
//!     println!("Received {} bytes", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::DeviceReply;
use intercom_core::{Error, Result};

/// Tokio codec passing transport chunks through and writing reply tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceCodec {
    _private: (),
}

impl DeviceCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for DeviceCodec {
    type Item = Bytes;
    type Error = Error;

    /// Yield everything read so far as a single chunk.
    ///
    /// Returns `Ok(None)` only when the buffer is empty, so the framed
    /// reader never merges two reads into one chunk.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }
        Ok(Some(src.split().freeze()))
    }
}

impl Encoder<DeviceReply> for DeviceCodec {
    type Error = Error;

    fn encode(&mut self, item: DeviceReply, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(item.token().as_bytes());
        Ok(())
    }
}
