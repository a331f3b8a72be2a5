//! Incremental frame decoding
//!
//! Bytes arrive from the socket in arbitrary chunks. [`FrameDecoder`]
//! accumulates them and hands out complete frames:
//! - fewer bytes than a header, or than the declared payload: need more data
//! - a header declaring more than the configured maximum: malformed frame
//! - end of stream with a partial frame buffered: truncated frame

use bytes::BytesMut;
use tracing::trace;

use crate::{
    error::{Error, Result},
    frame::Frame,
};

/// Accumulates stream bytes and extracts complete frames
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload: usize,
}

impl FrameDecoder {
    /// Initial buffer capacity
    const INITIAL_CAPACITY: usize = 4 * 1024;

    /// Create a decoder accepting any payload the wire format can express
    pub fn new() -> Self {
        Self::with_max_payload(Frame::MAX_PAYLOAD_SIZE)
    }

    /// Create a decoder rejecting payloads above `max_payload`
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(Self::INITIAL_CAPACITY),
            max_payload: max_payload.min(Frame::MAX_PAYLOAD_SIZE),
        }
    }

    /// Largest payload this decoder accepts
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Buffer to read socket data into directly
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Extract the next complete frame, if one is buffered
    ///
    /// # Examples
    ///
    /// ```
    /// use jcop_remote_core::{Frame, FrameDecoder};
    ///
    /// let encoded = Frame::apdu(vec![0x00, 0xB0, 0x00, 0x00]).encode().unwrap();
    /// let mut decoder = FrameDecoder::new();
    ///
    /// decoder.extend(&encoded[..5]);
    /// assert!(decoder.next_frame().unwrap().is_none());
    ///
    /// decoder.extend(&encoded[5..]);
    /// assert!(decoder.next_frame().unwrap().unwrap().is_apdu());
    /// ```
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = Frame::decode_with_limit(&mut self.buffer, self.max_payload)?;

        if let Some(frame) = &frame {
            trace!(
                kind = %frame.kind,
                node = frame.node,
                payload = %hex::encode_upper(&frame.payload),
                "Decoded frame"
            );
        }

        Ok(frame)
    }

    /// Push bytes and extract every frame they complete
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Signal end of stream
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedFrame`] if a partial frame is still buffered.
    pub fn finish(&self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let expected = Frame::peek_payload_len(&self.buffer)
            .map(|len| Frame::HEADER_SIZE + len)
            .unwrap_or(Frame::HEADER_SIZE);

        Err(Error::TruncatedFrame {
            buffered: self.buffer.len(),
            expected,
        })
    }

    /// Get the number of buffered bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
