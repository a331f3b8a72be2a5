//! Error types for jcop-remote-core



/// Result type alias for jcop-remote-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Payload does not fit the 16-bit length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },
    
    /// Incoming frame declares more payload than this peer accepts
    #[error("Frame too large: header declares {declared} bytes (max: {max} bytes)")]
    FrameTooLarge {
        declared: usize,
        max: usize,
    },
    
    /// Stream ended in the middle of a frame
    #[error("Truncated frame: stream ended with {buffered} of {expected} bytes buffered")]
    TruncatedFrame {
        buffered: usize,
        expected: usize,
    },
    
    /// Command data does not fit a short APDU
    #[error("APDU data too long: {size} bytes (max: {max} bytes)")]
    ApduDataTooLong {
        size: usize,
        max: usize,
    },
    
    /// Connection state machine rejected a transition
    #[error("Invalid connection state: {0}")]
    InvalidConnectionState(String),
    
    /// Malformed value type (status word, ATR)
    #[error("Type error: {0}")]
    Types(#[from] jcop_remote_types::Error),
}

impl Error {
    /// Check if error is recoverable (the connection can keep going)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. } | Self::ApduDataTooLong { .. }
        )
    }
    
    /// Check if error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLarge { .. }
                | Self::TruncatedFrame { .. }
                | Self::InvalidConnectionState(_)
        )
    }
}
