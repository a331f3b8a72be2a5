//! ISO7816-4 status words

use std::fmt;

use crate::error::{Error, Result};

/// The two trailing status bytes (SW1 SW2) of a response APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    /// Normal processing, no further qualification
    pub const SUCCESS: Self = Self::new(0x90, 0x00);
    
    /// Size of the trailer in a response APDU
    pub const LEN: usize = 2;
    
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }
    
    /// Split a response APDU into its body and trailing status word
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the response is shorter than the trailer.
    ///
    /// # Examples
    ///
    /// ```
    /// use jcop_remote_types::StatusWord;
    ///
    /// let (body, sw) = StatusWord::split_response(&[0x27, 0x90, 0x00]).unwrap();
    /// assert_eq!(body, &[0x27]);
    /// assert!(sw.is_success());
    /// ```
    pub fn split_response(response: &[u8]) -> Result<(&[u8], Self)> {
        if response.len() < Self::LEN {
            return Err(Error::Parse(format!(
                "response of {} bytes has no status word",
                response.len()
            )));
        }
        
        let (body, trailer) = response.split_at(response.len() - Self::LEN);
        Ok((body, Self::new(trailer[0], trailer[1])))
    }
    
    /// Check if this is `90 00`
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
    
    pub fn to_u16(self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }
}

impl From<u16> for StatusWord {
    fn from(value: u16) -> Self {
        let [sw1, sw2] = value.to_be_bytes();
        Self { sw1, sw2 }
    }
}

impl From<StatusWord> for u16 {
    fn from(sw: StatusWord) -> u16 {
        sw.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}{:02X}", self.sw1, self.sw2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    
    #[test]
    fn test_split_response() {
        let (body, sw) = StatusWord::split_response(&[1, 2, 3, 0x6A, 0x82]).unwrap();
        assert_eq!(body, &[1, 2, 3]);
        assert_eq!(sw, StatusWord::new(0x6A, 0x82));
        assert!(!sw.is_success());
    }
    
    #[test]
    fn test_split_response_trailer_only() {
        let (body, sw) = StatusWord::split_response(&[0x90, 0x00]).unwrap();
        assert!(body.is_empty());
        assert!(sw.is_success());
    }
    
    #[test]
    fn test_split_response_too_short() {
        assert!(matches!(StatusWord::split_response(&[0x90]), Err(Error::Parse(_))));
        assert!(StatusWord::split_response(&[]).is_err());
    }
    
    #[test]
    fn test_status_word_u16_conversion() {
        assert_eq!(StatusWord::from(0x6982), StatusWord::new(0x69, 0x82));
        assert_eq!(u16::from(StatusWord::SUCCESS), 0x9000);
    }
    
    #[test]
    fn test_status_word_display() {
        assert_eq!(StatusWord::new(0x6A, 0x82).to_string(), "0x6A82");
    }
}
