//! Core constants for the intercom device protocol.
//!
//! This module defines the wire tokens exchanged with the access-control
//! device, the default limits applied to the image transfer, and the
//! texts shown to reviewers in the messaging channel.
//!
//! # Wire Vocabulary
//!
//! The device speaks a chunk-oriented text protocol. Every command is sent
//! as its own transport chunk and the payload for that command follows in
//! the next chunk(s):
//!
//! ```text
//! device -> server:  "start"  "42"
//! server -> device:  "photo"
//! device -> server:  "photo"  <u32 BE length><jpeg bytes>
//! server -> device:  "accept"
//! device -> server:  "accept_ok"  "\n"
//! ```
//!
//! # Usage
//!
//! ```
//! use intercom_core::constants::*;
//!
//! assert_eq!(TOKEN_START, "start");
//! assert_eq!(FRAME_HEADER_LEN, 4);
//! ```

// ============================================================================
// Device -> Server Tokens
// ============================================================================

/// Visitor announced a unit number; the next chunk carries the digits.
pub const TOKEN_START: &str = "start";

/// Image transfer follows as length-prefixed frames.
///
/// Also written to the device when a reviewer requests a photo.
pub const TOKEN_PHOTO: &str = "photo";

/// Visitor cancelled the request on the keypad.
pub const TOKEN_CANCEL: &str = "cancel";

/// Device executed an accept decision.
pub const TOKEN_ACCEPT_OK: &str = "accept_ok";

/// Device executed a reject decision.
pub const TOKEN_REJECT_OK: &str = "reject_ok";

// ============================================================================
// Server -> Device Tokens
// ============================================================================

/// No reviewer is registered for the announced unit.
pub const TOKEN_NOT_FOUND: &str = "not_found";

/// Open the door.
pub const TOKEN_ACCEPT: &str = "accept";

/// Refuse entry.
pub const TOKEN_REJECT: &str = "reject";

// ============================================================================
// Image Framing
// ============================================================================

/// Size of the big-endian length prefix in front of every image frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound for a declared image length (8 MiB).
///
/// Camera frames from the device are JPEGs well below 1 MiB; anything
/// larger than this is treated as a corrupted header.
pub const DEFAULT_MAX_IMAGE_SIZE: usize = 8 * 1024 * 1024;

// ============================================================================
// Network Defaults
// ============================================================================

/// Default TCP port the device connects to.
pub const DEFAULT_DEVICE_PORT: u16 = 3001;

/// Default bind address for the device listener.
pub const DEFAULT_DEVICE_BIND_ADDR: &str = "0.0.0.0:3001";

// ============================================================================
// Callback Data
// ============================================================================

/// Callback data attached to the "Photo" button.
pub const CALLBACK_PHOTO: &str = "photo";

/// Callback data attached to the "Accept" button.
pub const CALLBACK_ACCEPT: &str = "accept";

/// Callback data attached to the "Reject" button.
pub const CALLBACK_REJECT: &str = "reject";

/// Callback data attached to the "Change unit" menu button.
pub const CALLBACK_CHANGE_UNIT: &str = "change-unit";

// ============================================================================
// Reviewer Texts
// ============================================================================

pub const TEXT_BUTTON_PHOTO: &str = "Photo";
pub const TEXT_BUTTON_ACCEPT: &str = "Accept";
pub const TEXT_BUTTON_REJECT: &str = "Reject";
pub const TEXT_BUTTON_CHANGE_UNIT: &str = "Change unit";

pub const TEXT_PHOTO_CAPTION: &str = "Photo from the entrance";
pub const TEXT_ENTRY_GRANTED: &str = "The door has been opened";
pub const TEXT_ENTRY_DENIED: &str = "Entry has been denied";
pub const TEXT_ENTRY_CANCELLED: &str = "The visitor cancelled the call";
pub const TEXT_SESSION_INACTIVE: &str = "The session is inactive";
pub const TEXT_ACK_ACCEPT: &str = "Opening the door";
pub const TEXT_ACK_REJECT: &str = "Entry rejected";
pub const TEXT_ACK_PHOTO: &str = "Requesting a photo";

pub const TEXT_MENU: &str = "Choose an action";
pub const TEXT_REGISTER_PROMPT: &str = "Enter your unit number. It must consist of digits";
pub const TEXT_REGISTER_DIGITS_ONLY: &str = "The unit number must consist of digits";
pub const TEXT_REGISTER_DONE: &str = "Unit linked successfully";

/// Text announcing a visitor at the given unit.
pub fn visitor_announcement(unit: impl std::fmt::Display) -> String {
    format!("Someone is calling unit {unit}")
}
