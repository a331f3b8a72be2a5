//! PC/SC card backend
//! Can be enabled by turning `pcsc` feature on.
//!
//! Serves a card inserted in a local reader to remote clients. Every remote
//! session starts with a card reset, so each client sees a fresh ATR.
//!
//! ## Usage
//! ```rust,no_run
//! use jcop_remote::pcsc::PcscCard;
//! use jcop_remote::{RemoteServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let card = PcscCard::open_first()?;
//!     let server = RemoteServer::bind(ServerConfig::new("0.0.0.0", 8050)).await?;
//!     server.run(card).await?;
//!     Ok(())
//! }
//! ```
//!
//! Reader calls block the worker they run on; serve from a multi-threaded
//! runtime.

use std::ffi::CStr;

use async_trait::async_trait;
use bytes::Bytes;
use pcsc::{Attribute, Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use tracing::{debug, info};

use crate::logic::{BackendResult, CardLogic};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;

/// A card in a local PC/SC reader
pub struct PcscCard {
    card: Card,
}

impl PcscCard {
    /// Connect to the card in the first reader PC/SC reports
    pub fn open_first() -> Result<Self> {
        let ctx = Context::establish(Scope::User)?;

        let mut buf = [0u8; 2048];
        let reader = ctx
            .list_readers(&mut buf)?
            .next()
            .ok_or(Error::ReaderNotFound)?;

        Self::connect(&ctx, reader)
    }

    /// Connect to the card in `reader`
    pub fn connect(ctx: &Context, reader: &CStr) -> Result<Self> {
        info!("Using reader: {}", reader.to_string_lossy());

        let card = ctx.connect(reader, ShareMode::Shared, Protocols::ANY)?;
        Ok(Self { card })
    }

    /// Wrap an already connected card
    pub fn from_card(card: Card) -> Self {
        Self { card }
    }
}

#[async_trait]
impl CardLogic for PcscCard {
    async fn connection_start(&mut self) -> BackendResult<()> {
        debug!("Resetting card for new session");
        self.card
            .reconnect(ShareMode::Shared, Protocols::ANY, Disposition::ResetCard)?;
        Ok(())
    }

    async fn connection_end(&mut self) -> BackendResult<()> {
        debug!("Session ended");
        Ok(())
    }

    async fn exchange_apdu(&mut self, command: Bytes) -> BackendResult<Bytes> {
        debug!("TX: {}", hex::encode(&command));

        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = self.card.transmit(&command, &mut rx)?;

        debug!("RX: {}", hex::encode(rx));

        Ok(Bytes::copy_from_slice(rx))
    }

    async fn card_atr(&mut self) -> BackendResult<Bytes> {
        let atr = self.card.get_attribute_owned(Attribute::AtrString)?;
        Ok(Bytes::from(atr))
    }
}
