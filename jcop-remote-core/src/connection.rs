//! Server-side connection state machine
//!
//! A connection moves through:
//! - `Idle`: accepted, nothing sent yet
//! - `HandshakeSent`: the ATR frame went out
//! - `Exchanging`: at least one command APDU was received
//! - `Closed`: the peer hung up or the connection failed
//!
//! Inbound frames other than APDUs are ignored once the handshake is sent,
//! so peers speaking a newer revision of the protocol keep working.

use bytes::Bytes;
use tracing::warn;

use crate::{
    error::{Error, Result},
    frame::Frame,
    kind::FrameKind,
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, handshake not sent
    Idle,

    /// ATR frame sent, no command received yet
    HandshakeSent,

    /// Relaying command APDUs
    Exchanging,

    /// Torn down
    Closed,
}

/// What the server should do with an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Relay the command to the card and answer on `node`
    Exchange {
        node: u8,
        command: Bytes,
    },

    /// Drop the frame and keep reading
    Ignore(FrameKind),
}

/// Tracks one accepted connection
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    exchanges: u64,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            exchanges: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of commands dispatched so far
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Check if the connection still carries traffic
    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::HandshakeSent | ConnectionState::Exchanging
        )
    }

    /// Record that the ATR frame was sent
    pub fn handshake_sent(&mut self) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(Error::InvalidConnectionState(format!(
                "Cannot send handshake from state: {:?}",
                self.state
            )));
        }

        self.state = ConnectionState::HandshakeSent;
        Ok(())
    }

    /// Classify an inbound frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnectionState`] if called before the
    /// handshake or after close.
    pub fn receive(&mut self, frame: Frame) -> Result<Inbound> {
        if !self.is_open() {
            return Err(Error::InvalidConnectionState(format!(
                "Cannot receive {} in state: {:?}",
                frame, self.state
            )));
        }

        match frame.kind {
            FrameKind::Apdu => {
                self.state = ConnectionState::Exchanging;
                self.exchanges += 1;

                Ok(Inbound::Exchange {
                    node: frame.node,
                    command: frame.payload,
                })
            }
            kind => {
                warn!("Ignoring unexpected {} frame from client", kind);
                Ok(Inbound::Ignore(kind))
            }
        }
    }

    /// Close the connection
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open_connection() -> Connection {
        let mut connection = Connection::new();
        connection.handshake_sent().unwrap();
        connection
    }

    #[test]
    fn test_connection_new() {
        let connection = Connection::new();
        assert_eq!(connection.state(), ConnectionState::Idle);
        assert_eq!(connection.exchanges(), 0);
        assert!(!connection.is_open());
    }

    #[test]
    fn test_handshake_then_exchange() {
        let mut connection = open_connection();
        assert_eq!(connection.state(), ConnectionState::HandshakeSent);

        let inbound = connection.receive(Frame::apdu(vec![0x00, 0xA4])).unwrap();

        assert_eq!(
            inbound,
            Inbound::Exchange {
                node: 0,
                command: Bytes::from_static(&[0x00, 0xA4]),
            }
        );
        assert_eq!(connection.state(), ConnectionState::Exchanging);
        assert_eq!(connection.exchanges(), 1);
    }

    #[test]
    fn test_reply_node_follows_request() {
        let mut connection = open_connection();
        let inbound = connection
            .receive(Frame::new(FrameKind::Apdu, 2, vec![1]))
            .unwrap();

        assert!(matches!(inbound, Inbound::Exchange { node: 2, .. }));
    }

    #[test]
    fn test_non_apdu_frames_are_ignored() {
        let mut connection = open_connection();

        let atr = connection.receive(Frame::atr(vec![0x3B])).unwrap();
        assert_eq!(atr, Inbound::Ignore(FrameKind::Atr));

        let unknown = connection
            .receive(Frame::new(FrameKind::Other(0x7F), 0, vec![]))
            .unwrap();
        assert_eq!(unknown, Inbound::Ignore(FrameKind::Other(0x7F)));

        assert_eq!(connection.state(), ConnectionState::HandshakeSent);
        assert_eq!(connection.exchanges(), 0);
    }

    #[test]
    fn test_receive_before_handshake() {
        let mut connection = Connection::new();
        let result = connection.receive(Frame::apdu(vec![1]));

        assert!(matches!(result, Err(Error::InvalidConnectionState(_))));
    }

    #[test]
    fn test_handshake_only_once() {
        let mut connection = open_connection();
        assert!(connection.handshake_sent().is_err());
    }

    #[test]
    fn test_closed_connection_rejects_frames() {
        let mut connection = open_connection();
        connection.close();

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(connection.receive(Frame::apdu(vec![1])).is_err());
    }
}
