//! High-level error types

use std::net::SocketAddr;

use jcop_remote_types::StatusWord;

use crate::logic::BackendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] jcop_remote_core::Error),
    
    #[error("Transport error: {0}")]
    Transport(#[from] jcop_remote_transport::Error),
    
    #[error("Type error: {0}")]
    Types(#[from] jcop_remote_types::Error),
    
    #[error("Not connected to a remote card")]
    NotConnected,
    
    #[error("Protocol violation: {0}")]
    Protocol(String),
    
    #[error("Card returned status {0}")]
    CardStatus(StatusWord),
    
    #[error("Card backend failed: {0}")]
    Backend(#[source] BackendError),
    
    #[error("Connection from {peer} failed: {source}")]
    Connection {
        peer: SocketAddr,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Status word carried by a card-status error
    pub fn status_word(&self) -> Option<StatusWord> {
        match self {
            Self::CardStatus(sw) => Some(*sw),
            _ => None,
        }
    }
    
    /// Check if the session is unusable and must be re-established
    pub fn requires_reconnect(&self) -> bool {
        match self {
            Self::Core(e) => e.requires_reconnect(),
            Self::Transport(_) | Self::NotConnected | Self::Protocol(_) => true,
            Self::Connection { source, .. } => source.requires_reconnect(),
            Self::Types(_) | Self::CardStatus(_) | Self::Backend(_) => false,
        }
    }
}
