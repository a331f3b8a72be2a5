//! Client side of a remote-terminal session

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use jcop_remote_core::{constants::DEFAULT_READ_TIMEOUT, Frame, FrameKind, IsoApdu, ResponseApdu};
use jcop_remote_transport::{TcpTransport, Transport};
use jcop_remote_types::Atr;

use crate::error::{Error, Result};

/// A remote smart card
///
/// Looks like a local card handle: send a command APDU, get the response
/// APDU back. The server's ATR is cached at connect time and refreshed
/// whenever the server announces a new one.
///
/// # Examples
///
/// ```no_run
/// use jcop_remote::{IsoApdu, RemoteTransport};
///
/// #[tokio::main]
/// async fn main() -> jcop_remote::Result<()> {
///     let mut card = RemoteTransport::new("127.0.0.1", 8050);
///
///     card.connect().await?;
///     println!("ATR: {:?}", card.card_atr());
///
///     let data = card.iso_apdu(&IsoApdu::new(0xCA).p1(0x9F).p2(0x7F)).await?;
///     println!("CPLC: {:02X?}", data);
///
///     card.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct RemoteTransport {
    transport: Box<dyn Transport>,
    timeout: Duration,
    atr: Option<Atr>,
}

impl RemoteTransport {
    /// Create a client for the server at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_transport(TcpTransport::new(host, port))
    }

    /// Create a client over a preconfigured transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT),
            atr: None,
        }
    }

    /// Set how long to wait for each frame from the server
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.atr.is_some() && self.transport.is_connected()
    }

    /// ATR most recently announced by the server
    pub fn card_atr(&self) -> Option<&Atr> {
        self.atr.as_ref()
    }

    /// Connect to the server and wait for the card's ATR
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TCP connection fails
    /// - The server's first frame is not an ATR
    /// - The server hangs up or stays silent before the ATR
    pub async fn connect(&mut self) -> Result<()> {
        info!("Connecting to {}...", self.transport.remote_addr());

        self.transport.connect().await?;

        match self.handshake().await {
            Ok(atr) => {
                info!("Connected, card ATR {}", atr);
                self.atr = Some(atr);
                Ok(())
            }
            Err(e) => {
                if let Err(close) = self.transport.disconnect().await {
                    warn!("Failed to close after handshake error: {}", close);
                }
                Err(e)
            }
        }
    }

    /// Disconnect from the server
    ///
    /// Safe to call when not connected.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.atr.take().is_some() {
            info!("Disconnecting from {}...", self.transport.remote_addr());
        }

        self.transport.disconnect().await?;
        Ok(())
    }

    /// Send a command APDU and return the response APDU, status included
    ///
    /// ATR frames arriving while waiting update [`RemoteTransport::card_atr`]
    /// and do not end the wait.
    ///
    /// # Errors
    ///
    /// Any failure once the command is on its way (timeout, hang-up,
    /// malformed frame) closes the session. Call
    /// [`RemoteTransport::connect`] again to continue.
    pub async fn exchange_apdu(&mut self, command: impl Into<Bytes>) -> Result<Bytes> {
        self.ensure_connected()?;

        let request = Frame::apdu(command);

        match self.transact(&request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!("Exchange failed, closing session: {}", e);
                self.abort().await;
                Err(e)
            }
        }
    }

    /// Send an ISO7816 command and check its status word
    ///
    /// Returns the response data without the status word.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CardStatus`] if the card answers with anything other
    /// than `90 00`.
    pub async fn iso_apdu(&mut self, apdu: &IsoApdu) -> Result<Bytes> {
        let command = apdu.to_bytes()?;
        let raw = self.exchange_apdu(command).await?;
        let response = ResponseApdu::parse(raw)?;

        if !response.is_success() {
            debug!("Card rejected INS {:02X}: {}", apdu.ins, response.status);
            return Err(Error::CardStatus(response.status));
        }

        Ok(response.body)
    }

    // Helper methods

    async fn transact(&mut self, request: &Frame) -> Result<Bytes> {
        trace!("Sending: {:?}", request);
        self.transport.send_frame(request).await?;

        loop {
            let frame = self.transport.receive_frame(self.timeout).await?;
            trace!("Received: {:?}", frame);

            match frame.kind {
                FrameKind::Apdu => return Ok(frame.payload),
                FrameKind::Atr => {
                    let atr = Atr::from(frame.payload);
                    warn!("Server re-sent ATR {} while a command was pending", atr);
                    self.atr = Some(atr);
                }
                FrameKind::Other(tag) => {
                    debug!("Skipping frame with unknown kind {}", tag);
                }
            }
        }
    }

    /// Drop the session after a failed exchange
    async fn abort(&mut self) {
        self.atr = None;

        if let Err(e) = self.transport.disconnect().await {
            warn!("Failed to close after exchange error: {}", e);
        }
    }

    async fn handshake(&mut self) -> Result<Atr> {
        let frame = self.transport.receive_frame(self.timeout).await?;

        if !frame.is_atr() {
            return Err(Error::Protocol(format!(
                "expected ATR handshake, received {}",
                frame
            )));
        }

        Ok(Atr::from(frame.payload))
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }
}
