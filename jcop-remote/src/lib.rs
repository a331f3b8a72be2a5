//! # jcop-remote
//!
//! Remote smart card access over TCP, compatible with the JCOP remote
//! terminal protocol.
//!
//! ## Features
//!
//! - Client that looks like a local card handle ([`RemoteTransport`])
//! - Server that exposes any [`CardLogic`] backend ([`RemoteServer`])
//! - Scripted backend for tests ([`ScriptedCard`])
//! - PC/SC backend behind the `pcsc` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use jcop_remote::RemoteTransport;
//!
//! #[tokio::main]
//! async fn main() -> jcop_remote::Result<()> {
//!     // Connect and wait for the ATR
//!     let mut card = RemoteTransport::new("127.0.0.1", 8050);
//!     card.connect().await?;
//!
//!     // SELECT by AID, status word included in the response
//!     let response = card
//!         .exchange_apdu(vec![0x00, 0xA4, 0x04, 0x00, 0x00])
//!         .await?;
//!     println!("{:02X?}", response);
//!
//!     card.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod logic;
#[cfg(feature = "pcsc")]
pub mod pcsc;
pub mod scripted;
pub mod server;

// Re-exports
pub use client::RemoteTransport;
pub use error::{Error, Result};
pub use logic::{BackendError, BackendResult, CardLogic};
pub use scripted::{CardEvent, EventLog, ScriptedCard};
pub use server::{ConnectionFailure, ErrorPolicy, RemoteServer, ServerConfig, ServerHandle};

// Re-export types
pub use jcop_remote_core::{Frame, FrameKind, IsoApdu, ResponseApdu, DEFAULT_PORT};
pub use jcop_remote_types::{Atr, StatusWord};
