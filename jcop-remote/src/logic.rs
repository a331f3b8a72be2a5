//! Card backend capability
//!
//! The server never talks to a card itself. It drives an implementation of
//! [`CardLogic`] through each connection:
//!
//! ```text
//! connection_start -> card_atr -> exchange_apdu* -> connection_end
//! ```

use async_trait::async_trait;
use bytes::Bytes;

/// Error raised by a card backend
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for card backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A card (real or simulated) that can be served to remote clients
///
/// One backend drives one connection at a time; the server serializes
/// connections against it.
#[async_trait]
pub trait CardLogic: Send {
    /// A client connected; prepare the card for a new session
    async fn connection_start(&mut self) -> BackendResult<()>;
    
    /// The client went away
    async fn connection_end(&mut self) -> BackendResult<()>;
    
    /// Transmit a command APDU and return the response APDU, status included
    async fn exchange_apdu(&mut self, command: Bytes) -> BackendResult<Bytes>;
    
    /// Answer To Reset of the card for the current session
    async fn card_atr(&mut self) -> BackendResult<Bytes>;
}

#[async_trait]
impl<L> CardLogic for Box<L>
where
    L: CardLogic + ?Sized,
{
    async fn connection_start(&mut self) -> BackendResult<()> {
        (**self).connection_start().await
    }
    
    async fn connection_end(&mut self) -> BackendResult<()> {
        (**self).connection_end().await
    }
    
    async fn exchange_apdu(&mut self, command: Bytes) -> BackendResult<Bytes> {
        (**self).exchange_apdu(command).await
    }
    
    async fn card_atr(&mut self) -> BackendResult<Bytes> {
        (**self).card_atr().await
    }
}
