//! Transport layer for the JCOP remote-terminal protocol
//!
//! Moves frames over TCP for both peers.

pub mod error;
pub mod framed;
pub mod tcp;

pub use error::{Error, Result};
pub use framed::FramedStream;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use jcop_remote_core::Frame;

/// Transport trait for the client side of a remote-terminal session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to server
    async fn connect(&mut self) -> Result<()>;
    
    /// Disconnect from server
    async fn disconnect(&mut self) -> Result<()>;
    
    /// Check if connected
    fn is_connected(&self) -> bool;
    
    /// Send one frame
    async fn send_frame(&mut self, frame: &Frame) -> Result<()>;
    
    /// Receive one frame, waiting at most `timeout`
    async fn receive_frame(&mut self, timeout: Duration) -> Result<Frame>;
    
    /// Get remote address
    fn remote_addr(&self) -> String;
}
