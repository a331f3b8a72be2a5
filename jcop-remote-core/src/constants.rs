//! Protocol constants

/// Node addressed by every frame until multi-card support exists
pub const DEFAULT_NODE: u8 = 0;

/// Default connection timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Default read timeout (seconds); card operations such as key generation are slow
pub const DEFAULT_READ_TIMEOUT: u64 = 30;

/// ISO7816 command APDU defaults
pub mod iso {
    /// Interindustry class byte
    pub const CLA_DEFAULT: u8 = 0x00;
    
    /// Expected length used when none is requested
    pub const LE_DEFAULT: u8 = 0x00;
    
    /// Longest data field a short APDU can carry
    pub const MAX_SHORT_DATA: usize = 0xFF;
}
