//! Remote-terminal frame structure and encoding/decoding

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    constants::DEFAULT_NODE,
    error::{Error, Result},
    kind::FrameKind,
};

/// Remote-terminal frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┐
/// │    Kind     │    Node     │   Length    │   Payload   │
/// │   1 byte    │   1 byte    │   2 bytes   │   N bytes   │
/// │    (u8)     │    (u8)     │  (BE u16)   │   (bytes)   │
/// └─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// Multi-byte values are big-endian.
///
/// # Examples
///
/// ```
/// use jcop_remote_core::{Frame, FrameKind};
///
/// let frame = Frame::apdu(vec![0x00, 0xA4, 0x04, 0x00]);
/// let mut buf = frame.encode().unwrap();
///
/// let decoded = Frame::decode(&mut buf).unwrap().unwrap();
/// assert_eq!(decoded.kind, FrameKind::Apdu);
/// assert!(buf.is_empty());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Kind tag
    pub kind: FrameKind,

    /// Card slot the frame is addressed to
    pub node: u8,

    /// Frame payload (ATR bytes or APDU bytes)
    pub payload: Bytes,
}

impl Frame {
    /// Frame header size in bytes
    pub const HEADER_SIZE: usize = crate::HEADER_SIZE;

    /// Maximum payload size
    pub const MAX_PAYLOAD_SIZE: usize = crate::MAX_PAYLOAD_SIZE;

    /// Create a frame with payload
    pub fn new(kind: FrameKind, node: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            node,
            payload: payload.into(),
        }
    }

    /// ATR frame on the default node
    pub fn atr(atr: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Atr, DEFAULT_NODE, atr)
    }

    /// APDU frame on the default node
    ///
    /// # Examples
    ///
    /// ```
    /// use jcop_remote_core::{Frame, FrameKind};
    ///
    /// let frame = Frame::apdu(vec![1, 2, 3]);
    /// assert_eq!(frame.kind, FrameKind::Apdu);
    /// assert_eq!(frame.node, 0);
    /// ```
    pub fn apdu(apdu: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Apdu, DEFAULT_NODE, apdu)
    }

    /// Encode frame to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload does not fit the
    /// 16-bit length field.
    ///
    /// # Examples
    ///
    /// ```
    /// use jcop_remote_core::Frame;
    ///
    /// let bytes = Frame::atr(vec![0x31, 0x41, 0x59]).encode().unwrap();
    /// assert_eq!(&bytes[..], &[0x00, 0x00, 0x00, 0x03, 0x31, 0x41, 0x59]);
    /// ```
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.size());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Append the encoded frame to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let len = u16::try_from(self.payload.len()).map_err(|_| Error::PayloadTooLarge {
            size: self.payload.len(),
            max: Self::MAX_PAYLOAD_SIZE,
        })?;

        buf.reserve(Self::HEADER_SIZE + self.payload.len());
        buf.put_u8(self.kind.into());
        buf.put_u8(self.node);
        buf.put_u16(len);
        buf.put_slice(&self.payload);

        Ok(())
    }

    /// Read the payload length declared by a buffered header
    ///
    /// Returns `None` while fewer than [`Frame::HEADER_SIZE`] bytes are
    /// buffered.
    pub fn peek_payload_len(buf: &[u8]) -> Option<usize> {
        if buf.len() < Self::HEADER_SIZE {
            return None;
        }

        Some(BigEndian::read_u16(&buf[2..Self::HEADER_SIZE]) as usize)
    }

    /// Decode one frame from the front of `buf`
    ///
    /// On success the frame's bytes are consumed from `buf`. While the buffer
    /// holds less than one complete frame, `Ok(None)` is returned and nothing
    /// is consumed.
    ///
    /// # Examples
    ///
    /// ```
    /// use jcop_remote_core::Frame;
    /// use bytes::BytesMut;
    ///
    /// // Header declares 3 payload bytes, only 1 has arrived
    /// let mut buf = BytesMut::from(&[0x01, 0x00, 0x00, 0x03, 0xAA][..]);
    /// assert!(Frame::decode(&mut buf).unwrap().is_none());
    /// assert_eq!(buf.len(), 5);
    /// ```
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>> {
        Self::decode_with_limit(buf, Self::MAX_PAYLOAD_SIZE)
    }

    /// Decode one frame, rejecting payloads above `max_payload`
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`] as soon as a header declaring more than
    /// `max_payload` bytes is buffered.
    pub fn decode_with_limit(buf: &mut BytesMut, max_payload: usize) -> Result<Option<Self>> {
        let Some(payload_len) = Self::peek_payload_len(&buf[..]) else {
            return Ok(None);
        };

        if payload_len > max_payload {
            return Err(Error::FrameTooLarge {
                declared: payload_len,
                max: max_payload,
            });
        }

        if buf.len() < Self::HEADER_SIZE + payload_len {
            return Ok(None);
        }

        let kind = FrameKind::from(buf.get_u8());
        let node = buf.get_u8();
        let _ = buf.get_u16();
        let payload = buf.split_to(payload_len).freeze();

        Ok(Some(Self {
            kind,
            node,
            payload,
        }))
    }

    /// Check if this is an ATR frame
    pub fn is_atr(&self) -> bool {
        self.kind == FrameKind::Atr
    }

    /// Check if this is an APDU frame
    pub fn is_apdu(&self) -> bool {
        self.kind == FrameKind::Apdu
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("node", &self.node)
            .field("payload", &hex::encode_upper(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](node={}, len={})",
            self.kind,
            self.node,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(FrameKind::Apdu, 3, vec![1, 2]);
        assert_eq!(frame.kind, FrameKind::Apdu);
        assert_eq!(frame.node, 3);
        assert_eq!(frame.payload.as_ref(), &[1, 2]);
    }

    #[test]
    fn test_frame_wire_layout() {
        let frame = Frame::new(FrameKind::Apdu, 0x02, vec![0xAB; 0x0102]);
        let encoded = frame.encode().unwrap();

        assert_eq!(&encoded[..4], &[0x01, 0x02, 0x01, 0x02]);
        assert_eq!(encoded.len(), 4 + 0x0102);
    }

    #[test]
    fn test_frame_encode_decode() {
        let original = Frame::apdu(vec![0x31, 0x41, 0x59, 0x26, 0x53]);

        let mut encoded = original.encode().unwrap();
        let decoded = Frame::decode(&mut encoded).unwrap().unwrap();

        assert_eq!(original, decoded);
        assert!(encoded.is_empty());
    }

    #[test]
    fn test_frame_empty_payload() {
        let mut encoded = Frame::apdu(Bytes::new()).encode().unwrap();
        assert_eq!(encoded.len(), Frame::HEADER_SIZE);

        let decoded = Frame::decode(&mut encoded).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 0);
    }

    #[test]
    fn test_frame_payload_too_large() {
        let frame = Frame::apdu(vec![0u8; Frame::MAX_PAYLOAD_SIZE + 1]);

        assert!(matches!(
            frame.encode(),
            Err(Error::PayloadTooLarge { size, max: 65535 }) if size == 65536
        ));
    }

    #[test]
    fn test_frame_max_payload_fits() {
        let frame = Frame::apdu(vec![0u8; Frame::MAX_PAYLOAD_SIZE]);
        let encoded = frame.encode().unwrap();
        assert_eq!(&encoded[2..4], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_short_header_needs_more() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x00][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_short_payload_needs_more() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00, 0x04, 1, 2, 3][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[4]);
        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.kind, FrameKind::Atr);
        assert_eq!(frame.payload.as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_leaves_next_frame_buffered() {
        let mut buf = Frame::atr(vec![9]).encode().unwrap();
        Frame::apdu(vec![8, 7]).encode_into(&mut buf).unwrap();

        let first = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(first.is_atr());

        let second = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(second.is_apdu());
        assert_eq!(second.payload.as_ref(), &[8, 7]);

        assert!(Frame::decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_with_limit_rejects_large_header() {
        // Only the header has arrived, the limit is already known to be exceeded
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x01, 0x00][..]);
        let result = Frame::decode_with_limit(&mut buf, 255);

        assert!(matches!(
            result,
            Err(Error::FrameTooLarge { declared: 256, max: 255 })
        ));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let mut buf = BytesMut::from(&[0x07, 0x01, 0x00, 0x01, 0xEE][..]);
        let frame = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(frame.kind, FrameKind::Other(7));
        assert_eq!(frame.node, 1);
        assert!(!frame.is_atr());
        assert!(!frame.is_apdu());
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::atr(vec![1, 2, 3]);
        assert_eq!(frame.to_string(), "Frame[ATR(0)](node=0, len=3)");
    }
}
