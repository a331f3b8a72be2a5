//! ISO7816-4 command and response APDUs

use bytes::{BufMut, Bytes, BytesMut};

use jcop_remote_types::StatusWord;

use crate::{
    constants::iso,
    error::{Error, Result},
};

/// Builder for a short command APDU
///
/// Serializes as `CLA INS P1 P2 Lc [data] Le`. `Lc` is always present and
/// carries the data length (zero without data). `Le` defaults to zero.
///
/// # Examples
///
/// ```
/// use jcop_remote_core::IsoApdu;
///
/// let apdu = IsoApdu::new(0x31).p1(0x41).p2(0x59);
/// assert_eq!(&apdu.to_bytes().unwrap()[..], &[0x00, 0x31, 0x41, 0x59, 0x00, 0x00]);
///
/// let select = IsoApdu::new(0xA4).p1(0x04).data(vec![0xA0, 0x00]).le(0x10);
/// assert_eq!(
///     &select.to_bytes().unwrap()[..],
///     &[0x00, 0xA4, 0x04, 0x00, 0x02, 0xA0, 0x00, 0x10]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoApdu {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Option<Bytes>,
    pub le: Option<u8>,
}

impl IsoApdu {
    /// Command with the given instruction and default class
    pub fn new(ins: u8) -> Self {
        Self {
            cla: iso::CLA_DEFAULT,
            ins,
            p1: 0,
            p2: 0,
            data: None,
            le: None,
        }
    }

    pub fn cla(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    pub fn p1(mut self, p1: u8) -> Self {
        self.p1 = p1;
        self
    }

    pub fn p2(mut self, p2: u8) -> Self {
        self.p2 = p2;
        self
    }

    /// Set command data
    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set expected response length
    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Serialize the command
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApduDataTooLong`] if the data does not fit a short
    /// APDU's one-byte `Lc`.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let data = self.data.as_deref().unwrap_or_default();
        let lc = u8::try_from(data.len()).map_err(|_| Error::ApduDataTooLong {
            size: data.len(),
            max: iso::MAX_SHORT_DATA,
        })?;

        let mut buf = BytesMut::with_capacity(6 + data.len());
        buf.put_slice(&[self.cla, self.ins, self.p1, self.p2]);
        buf.put_u8(lc);
        buf.put_slice(data);
        buf.put_u8(self.le.unwrap_or(iso::LE_DEFAULT));

        Ok(buf.freeze())
    }
}

/// Response APDU split into body and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    pub body: Bytes,
    pub status: StatusWord,
}

impl ResponseApdu {
    /// Split raw response bytes
    ///
    /// # Errors
    ///
    /// Fails if the response is shorter than the two-byte trailer.
    pub fn parse(response: Bytes) -> Result<Self> {
        let (body, status) = StatusWord::split_response(&response)?;
        let body = response.slice(..body.len());

        Ok(Self { body, status })
    }

    /// Check for `90 00`
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
