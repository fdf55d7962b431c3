//! Length-prefixed frame decoder for image transfers.
//!
//! Images are the only binary payload on the device link. Each image is
//! sent as a frame:
//!
//! ```text
//! ┌──────────────────────┬───────────────────────────┐
//! │ length (u32, BE)     │ payload (length bytes)    │
//! └──────────────────────┴───────────────────────────┘
//!        4 bytes                 JPEG data
//! ```
//!
//! TCP gives no guarantee about where a read ends, so the decoder accepts
//! chunks split anywhere: inside the 4-byte header, in the middle of the
//! payload, or with several frames back to back in a single chunk.
//!
//! # Usage
//!
//! ```
//! use intercom_protocol::{FrameDecoder, encode_frame};
//!
//! let wire = encode_frame(b"jpeg");
//! let mut decoder = FrameDecoder::new();
//!
//! // Header split across two reads
//! decoder.feed(&wire[..2]).unwrap();
//! decoder.feed(&wire[2..]).unwrap();
//!
//! assert_eq!(decoder.next_frame().unwrap().as_ref(), b"jpeg");
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;

use intercom_core::constants::{DEFAULT_MAX_IMAGE_SIZE, FRAME_HEADER_LEN};
use intercom_core::{Error, Result};
use tracing::{trace, warn};

/// Recommended initial capacity for the completed-frame queue.
///
/// A photo request yields one frame; a couple of spare slots cover a device
/// that pushes two frames in one burst.
const INITIAL_FRAME_QUEUE_CAPACITY: usize = 2;

/// State machine states for reassembling a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Accumulating the 4-byte big-endian length prefix.
    ReadingHeader,

    /// Copying payload bytes until the declared length is reached.
    ReadingPayload,
}

/// Stateful decoder for length-prefixed image frames.
///
/// The decoder is single-slot: at most one frame is being reassembled at
/// any time. Completed frames are queued and handed out with
/// [`next_frame`](FrameDecoder::next_frame) or
/// [`drain_frames`](FrameDecoder::drain_frames).
///
/// # State Machine
///
/// ```text
/// ┌──────────────┐  4 header bytes  ┌────────────────┐  declared bytes  ┌─────────────┐
/// │ReadingHeader │─────────────────>│ReadingPayload  │─────────────────>│Frame queued │
/// └──────────────┘                  └────────────────┘                  └─────────────┘
///        ^   │ length > max                                                    │
///        │   └── reset + FrameTooLarge                                         │
///        └─────────────────────────────────────────────────────────────────────┘
/// ```
///
/// # Example
///
/// ```
/// use intercom_protocol::{FrameDecoder, DecoderState, encode_frame};
///
/// let mut decoder = FrameDecoder::new();
/// let mut wire = encode_frame(b"first").to_vec();
/// wire.extend_from_slice(&encode_frame(b"second"));
///
/// decoder.feed(&wire).unwrap();
/// assert_eq!(decoder.frames_available(), 2);
/// assert_eq!(decoder.state(), DecoderState::ReadingHeader);
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    /// Current state of the reassembly state machine.
    state: DecoderState,

    /// Length prefix bytes seen so far.
    header: [u8; FRAME_HEADER_LEN],

    /// Number of valid bytes in `header`.
    header_seen: usize,

    /// Payload length announced by the current header.
    declared_len: usize,

    /// Payload of the frame being reassembled.
    payload: BytesMut,

    /// Completed frames ready for extraction.
    frames: VecDeque<Bytes>,

    /// Largest payload length accepted from a header.
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default image size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_IMAGE_SIZE)
    }

    /// Create a decoder that rejects frames declaring more than
    /// `max_frame_size` payload bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use intercom_protocol::FrameDecoder;
    ///
    /// let decoder = FrameDecoder::with_max_frame_size(1024);
    /// assert_eq!(decoder.max_frame_size(), 1024);
    /// ```
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            state: DecoderState::ReadingHeader,
            header: [0; FRAME_HEADER_LEN],
            header_seen: 0,
            declared_len: 0,
            payload: BytesMut::new(),
            frames: VecDeque::with_capacity(INITIAL_FRAME_QUEUE_CAPACITY),
            max_frame_size,
        }
    }

    /// Feed a transport chunk into the decoder.
    ///
    /// Every frame completed by this chunk is queued. Bytes that start the
    /// next frame are kept until the rest arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] when a header declares more than
    /// the configured maximum. The decoder is reset before returning, so
    /// the rest of the chunk is discarded.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let consumed = match self.state {
                DecoderState::ReadingHeader => self.read_header(bytes)?,
                DecoderState::ReadingPayload => self.read_payload(bytes),
            };
            bytes = &bytes[consumed..];
        }
        Ok(())
    }

    /// Extract the next completed frame, if any.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    /// Returns an iterator that drains all completed frames.
    ///
    /// # Example
    ///
    /// ```
    /// use intercom_protocol::{FrameDecoder, encode_frame};
    ///
    /// let mut decoder = FrameDecoder::new();
    /// decoder.feed(&encode_frame(b"a")).unwrap();
    /// decoder.feed(&encode_frame(b"b")).unwrap();
    ///
    /// let frames: Vec<_> = decoder.drain_frames().collect();
    /// assert_eq!(frames.len(), 2);
    /// ```
    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames { decoder: self }
    }

    /// Returns current decoder state.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Returns number of frames ready for extraction.
    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Bytes of the frame currently being reassembled (header included).
    pub fn bytes_pending(&self) -> usize {
        match self.state {
            DecoderState::ReadingHeader => self.header_seen,
            DecoderState::ReadingPayload => FRAME_HEADER_LEN + self.payload.len(),
        }
    }

    /// Returns `true` when no partial frame and no completed frame is held.
    pub fn is_empty(&self) -> bool {
        self.state == DecoderState::ReadingHeader
            && self.header_seen == 0
            && self.frames.is_empty()
    }

    /// Get the configured maximum payload length.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Discard any partial or queued frame and wait for a fresh header.
    ///
    /// Idempotent; safe to call at any point.
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader;
        self.header = [0; FRAME_HEADER_LEN];
        self.header_seen = 0;
        self.declared_len = 0;
        self.payload = BytesMut::new();
        self.frames.clear();
    }

    /// Consume header bytes. Returns how many bytes of `bytes` were used.
    fn read_header(&mut self, bytes: &[u8]) -> Result<usize> {
        let take = (FRAME_HEADER_LEN - self.header_seen).min(bytes.len());
        self.header[self.header_seen..self.header_seen + take].copy_from_slice(&bytes[..take]);
        self.header_seen += take;

        if self.header_seen == FRAME_HEADER_LEN {
            let declared = u32::from_be_bytes(self.header) as usize;
            if declared > self.max_frame_size {
                warn!(declared, max_size = self.max_frame_size, "Frame header exceeds size limit");
                self.reset();
                return Err(Error::FrameTooLarge {
                    declared,
                    max_size: self.max_frame_size,
                });
            }
            self.begin_payload(declared);
        }

        Ok(take)
    }

    /// Switch to payload reassembly for a frame of `declared` bytes.
    fn begin_payload(&mut self, declared: usize) {
        self.declared_len = declared;
        self.payload = BytesMut::with_capacity(declared);
        self.state = DecoderState::ReadingPayload;

        // An empty frame is complete as soon as its header is.
        if declared == 0 {
            self.complete_frame();
        }
    }

    /// Consume payload bytes. Returns how many bytes of `bytes` were used.
    fn read_payload(&mut self, bytes: &[u8]) -> usize {
        let remaining = self.declared_len - self.payload.len();
        let take = remaining.min(bytes.len());
        self.payload.extend_from_slice(&bytes[..take]);

        if self.payload.len() == self.declared_len {
            self.complete_frame();
        }

        take
    }

    /// Queue the reassembled payload and wait for the next header.
    fn complete_frame(&mut self) {
        let payload = std::mem::take(&mut self.payload).freeze();
        trace!(len = payload.len(), "Frame reassembled");
        self.frames.push_back(payload);
        self.state = DecoderState::ReadingHeader;
        self.header_seen = 0;
        self.declared_len = 0;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator that drains frames from a [`FrameDecoder`].
pub struct DrainFrames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for DrainFrames<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.decoder.frames_available();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrainFrames<'_> {
    fn len(&self) -> usize {
        self.decoder.frames_available()
    }
}

/// Encode `payload` as a length-prefixed frame.
///
/// This is what the device puts on the wire after a `photo` token.
///
/// # Panics
///
/// Panics if `payload` is longer than `u32::MAX` bytes.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let len = u32::try_from(payload.len()).expect("frame payload exceeds u32::MAX bytes");
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u32(len);
    buf.extend_from_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test helper: a payload with a recognisable byte pattern.
    fn sample_payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_new_decoder() {
        let decoder = FrameDecoder::new();
        assert_eq!(decoder.state(), DecoderState::ReadingHeader);
        assert_eq!(decoder.frames_available(), 0);
        assert_eq!(decoder.max_frame_size(), DEFAULT_MAX_IMAGE_SIZE);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_complete_frame_single_feed() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode_frame(b"\xff\xd8jpeg\xff\xd9")).unwrap();

        assert_eq!(decoder.frames_available(), 1);
        assert_eq!(decoder.next_frame().unwrap().as_ref(), b"\xff\xd8jpeg\xff\xd9");
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_header_split_inside_length_prefix() {
        let payload = sample_payload(300);
        let wire = encode_frame(&payload);
        let mut decoder = FrameDecoder::new();

        decoder.feed(&wire[..1]).unwrap();
        assert_eq!(decoder.state(), DecoderState::ReadingHeader);
        assert_eq!(decoder.bytes_pending(), 1);

        decoder.feed(&wire[1..3]).unwrap();
        assert_eq!(decoder.state(), DecoderState::ReadingHeader);

        decoder.feed(&wire[3..]).unwrap();
        assert_eq!(decoder.next_frame().unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_payload_split_across_many_chunks() {
        let payload = sample_payload(4096);
        let wire = encode_frame(&payload);
        let mut decoder = FrameDecoder::new();

        for chunk in wire.chunks(100) {
            assert_eq!(decoder.frames_available(), 0);
            decoder.feed(chunk).unwrap();
        }

        assert_eq!(decoder.frames_available(), 1);
        assert_eq!(decoder.next_frame().unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_byte_by_byte_feeding() {
        let wire = encode_frame(b"entrance");
        let mut decoder = FrameDecoder::new();

        for &byte in wire.iter() {
            decoder.feed(&[byte]).unwrap();
        }

        assert_eq!(decoder.next_frame().unwrap().as_ref(), b"entrance");
    }

    #[test]
    fn test_multiple_frames_in_single_chunk() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_frame(b"one"));
        wire.extend_from_slice(&encode_frame(b"two"));
        wire.extend_from_slice(&encode_frame(b"three"));

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire).unwrap();

        let frames: Vec<_> = decoder.drain_frames().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].as_ref(), b"one");
        assert_eq!(frames[1].as_ref(), b"two");
        assert_eq!(frames[2].as_ref(), b"three");
    }

    #[test]
    fn test_complete_frame_followed_by_partial() {
        let mut wire = encode_frame(b"first").to_vec();
        let second = encode_frame(b"second");
        wire.extend_from_slice(&second[..6]);

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire).unwrap();

        assert_eq!(decoder.frames_available(), 1);
        assert_eq!(decoder.state(), DecoderState::ReadingPayload);
        assert_eq!(decoder.next_frame().unwrap().as_ref(), b"first");

        decoder.feed(&second[6..]).unwrap();
        assert_eq!(decoder.next_frame().unwrap().as_ref(), b"second");
    }

    #[test]
    fn test_empty_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0, 0, 0, 0]).unwrap();

        assert_eq!(decoder.frames_available(), 1);
        assert!(decoder.next_frame().unwrap().is_empty());
        assert_eq!(decoder.state(), DecoderState::ReadingHeader);
    }

    #[test]
    fn test_frame_too_large_resets_decoder() {
        let mut decoder = FrameDecoder::with_max_frame_size(16);
        let mut wire = 17u32.to_be_bytes().to_vec();
        wire.extend_from_slice(&[0xAA; 17]);

        let result = decoder.feed(&wire);

        match result {
            Err(Error::FrameTooLarge { declared, max_size }) => {
                assert_eq!(declared, 17);
                assert_eq!(max_size, 16);
            }
            other => panic!("Expected FrameTooLarge, got {other:?}"),
        }
        assert!(decoder.is_empty());

        // Decoder accepts valid frames afterwards
        decoder.feed(&encode_frame(b"ok")).unwrap();
        assert_eq!(decoder.next_frame().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn test_frame_at_exact_limit_is_accepted() {
        let mut decoder = FrameDecoder::with_max_frame_size(8);
        decoder.feed(&encode_frame(&[7; 8])).unwrap();
        assert_eq!(decoder.next_frame().unwrap().len(), 8);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let wire = encode_frame(&sample_payload(64));
        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire[..20]).unwrap();
        assert_eq!(decoder.state(), DecoderState::ReadingPayload);

        decoder.reset();

        assert!(decoder.is_empty());
        assert_eq!(decoder.bytes_pending(), 0);

        // A fresh frame decodes without residue from the discarded one
        decoder.feed(&encode_frame(b"fresh")).unwrap();
        assert_eq!(decoder.next_frame().unwrap().as_ref(), b"fresh");
    }

    #[test]
    fn test_multiple_reset_calls() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0, 0]).unwrap();

        decoder.reset();
        decoder.reset();
        decoder.reset();

        assert!(decoder.is_empty());
        decoder.feed(&encode_frame(b"x")).unwrap();
        assert_eq!(decoder.frames_available(), 1);
    }

    #[test]
    fn test_reset_drops_queued_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode_frame(b"stale")).unwrap();
        assert_eq!(decoder.frames_available(), 1);

        decoder.reset();
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn test_drain_frames_size_hint() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode_frame(b"a")).unwrap();
        decoder.feed(&encode_frame(b"b")).unwrap();

        let mut iter = decoder.drain_frames();
        assert_eq!(iter.size_hint(), (2, Some(2)));
        let _ = iter.next();
        assert_eq!(iter.len(), 1);
        let _ = iter.next();
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_encode_frame_layout() {
        let wire = encode_frame(b"abc");
        assert_eq!(wire.as_ref(), &[0, 0, 0, 3, b'a', b'b', b'c']);
    }
}
