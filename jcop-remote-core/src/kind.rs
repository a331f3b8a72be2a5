//! Frame kind tags

use std::fmt;

/// Kind tag carried in the first header byte
///
/// Tags other than ATR and APDU are reserved for extensions. They decode to
/// [`FrameKind::Other`] so that receivers can skip them instead of failing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Answer To Reset announced by the card side
    Atr,
    
    /// Command APDU (client to server) or its response (server to client)
    Apdu,
    
    /// Unrecognised tag
    Other(u8),
}

impl FrameKind {
    pub const ATR_TAG: u8 = 0;
    pub const APDU_TAG: u8 = 1;
    
    /// Check if this peer understands the tag
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Other(_))
    }
    
    /// Get kind name
    pub fn name(self) -> &'static str {
        match self {
            Self::Atr => "ATR",
            Self::Apdu => "APDU",
            Self::Other(_) => "UNKNOWN",
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> u8 {
        match kind {
            FrameKind::Atr => FrameKind::ATR_TAG,
            FrameKind::Apdu => FrameKind::APDU_TAG,
            FrameKind::Other(tag) => tag,
        }
    }
}

impl From<u8> for FrameKind {
    fn from(tag: u8) -> Self {
        match tag {
            Self::ATR_TAG => Self::Atr,
            Self::APDU_TAG => Self::Apdu,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), u8::from(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_kind_conversion() {
        assert_eq!(u8::from(FrameKind::Atr), 0);
        assert_eq!(u8::from(FrameKind::Apdu), 1);
        assert_eq!(FrameKind::from(0), FrameKind::Atr);
        assert_eq!(FrameKind::from(1), FrameKind::Apdu);
    }
    
    #[test]
    fn test_unknown_kind_is_preserved() {
        let kind = FrameKind::from(0x42);
        assert_eq!(kind, FrameKind::Other(0x42));
        assert!(!kind.is_known());
        assert_eq!(u8::from(kind), 0x42);
    }
    
    #[test]
    fn test_kind_display() {
        assert_eq!(FrameKind::Apdu.to_string(), "APDU(1)");
        assert_eq!(FrameKind::Other(9).to_string(), "UNKNOWN(9)");
    }
}
