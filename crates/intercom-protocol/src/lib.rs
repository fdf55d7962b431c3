//! Wire protocol spoken by the intercom device.
//!
//! The device talks in transport chunks: a chunk that trims to a command
//! token selects the command, the following chunk(s) carry its payload.
//! Images travel as length-prefixed frames reassembled by [`FrameDecoder`].

pub mod codec;
pub mod command;
pub mod frame;

pub use codec::DeviceCodec;
pub use command::{DeviceCommand, DeviceReply};
pub use frame::{DecoderState, DrainFrames, FrameDecoder, encode_frame};
