//! # jcop-remote-core
//!
//! Core protocol implementation for the JCOP remote-terminal protocol.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - Incremental decoding of a byte stream into frames
//! - ISO7816 command APDU construction
//! - The server-side connection state machine
//! - Protocol constants

pub mod apdu;
pub mod codec;
pub mod connection;
pub mod constants;
pub mod error;
pub mod frame;
pub mod kind;

pub use apdu::{IsoApdu, ResponseApdu};
pub use codec::FrameDecoder;
pub use connection::{Connection, ConnectionState, Inbound};
pub use error::{Error, Result};
pub use frame::Frame;
pub use kind::FrameKind;

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";

/// Default remote-terminal port of the JCOP simulator
pub const DEFAULT_PORT: u16 = 8050;

/// Maximum payload size (16-bit length field)
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Frame header size
pub const HEADER_SIZE: usize = 4;
