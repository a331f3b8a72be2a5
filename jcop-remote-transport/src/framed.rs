//! Frame I/O over a byte stream

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use jcop_remote_core::{Frame, FrameDecoder};

use crate::error::Result;

/// Bytes reserved ahead of each socket read
const READ_CHUNK: usize = 1024;

/// A byte stream that reads and writes whole frames
///
/// Used by the client transport and by each server-side connection.
pub struct FramedStream<S = TcpStream> {
    stream: S,
    decoder: FrameDecoder,
    write_buf: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self::with_decoder(stream, FrameDecoder::new())
    }

    /// Reject inbound payloads above `max_payload`
    pub fn with_max_payload(stream: S, max_payload: usize) -> Self {
        Self::with_decoder(stream, FrameDecoder::with_max_payload(max_payload))
    }

    fn with_decoder(stream: S, decoder: FrameDecoder) -> Self {
        Self {
            stream,
            decoder,
            write_buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the peer closes the stream on a frame
    /// boundary. Cancel safe: bytes read before cancellation stay buffered.
    ///
    /// # Errors
    ///
    /// Fails on socket errors, on an oversized frame, and when the stream
    /// ends inside a frame.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Some(frame));
            }

            let buf = self.decoder.buffer_mut();
            buf.reserve(READ_CHUNK);

            let n = self.stream.read_buf(buf).await?;
            if n == 0 {
                self.decoder.finish()?;
                return Ok(None);
            }

            trace!("Received {} bytes", n);
        }
    }

    /// Write one frame and flush
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        frame.encode_into(&mut self.write_buf)?;

        trace!(
            "Sending {} bytes: {:02X?}",
            self.write_buf.len(),
            &self.write_buf[..self.write_buf.len().min(16)]
        );

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        Ok(())
    }

    /// Shut down the write half
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
