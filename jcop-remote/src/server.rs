//! Remote-terminal server
//!
//! Serves one [`CardLogic`] backend to TCP clients. Each accepted connection
//! runs on its own task:
//!
//! 1. `connection_start`
//! 2. one ATR frame built from `card_atr`
//! 3. every APDU frame is relayed through `exchange_apdu` and answered;
//!    other frame kinds are ignored
//! 4. `connection_end` once the client hangs up
//! 5. the socket is closed
//!
//! Connections hold the backend from step 1 through step 4, so a second
//! client waits for the first one to leave before its handshake is sent.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use jcop_remote_core::{
    constants::DEFAULT_NODE, Connection, Frame, FrameKind, Inbound, DEFAULT_PORT,
};
use jcop_remote_transport::FramedStream;

use crate::error::{Error, Result};
use crate::logic::CardLogic;

/// What a failed connection does to the rest of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Report the failure and keep accepting
    #[default]
    KeepServing,

    /// Stop accepting and return the failure from [`RemoteServer::run`]
    Shutdown,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,

    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,

    /// Largest command APDU accepted from clients
    pub max_payload: usize,

    pub error_policy: ErrorPolicy,
}

impl ServerConfig {
    pub fn new(bind_addr: impl Into<String>, port: u16) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            port,
            ..Self::default()
        }
    }

    /// Reject command frames with payloads above `max_payload`
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            max_payload: Frame::MAX_PAYLOAD_SIZE,
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// A connection that ended in an error
#[derive(Debug)]
pub struct ConnectionFailure {
    pub peer: SocketAddr,
    pub error: Error,
}

/// Cloneable handle that stops a running server
#[derive(Debug, Clone)]
pub struct ServerHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop: Arc::new(stop),
        }
    }

    /// Make [`RemoteServer::run`] return
    ///
    /// Idempotent. Connections already accepted run to completion.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }
}

/// Remote-terminal server
///
/// # Examples
///
/// ```no_run
/// use jcop_remote::{RemoteServer, ScriptedCard, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> jcop_remote::Result<()> {
///     let server = RemoteServer::bind(ServerConfig::new("127.0.0.1", 8050)).await?;
///     let card = ScriptedCard::new(vec![0x3B, 0x00]).respond(vec![0x90, 0x00]);
///
///     server.run(card).await
/// }
/// ```
pub struct RemoteServer {
    listener: TcpListener,
    config: ServerConfig,
    handle: ServerHandle,
    failure_tx: mpsc::UnboundedSender<ConnectionFailure>,
    failure_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionFailure>>>,
}

impl RemoteServer {
    /// Bind the listening socket
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))
            .await
            .map_err(jcop_remote_transport::Error::Io)?;

        info!(
            "Listening on {}",
            listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| format!("{}:{}", config.bind_addr, config.port))
        );

        let (failure_tx, failure_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            config,
            handle: ServerHandle::new(),
            failure_tx,
            failure_rx: Mutex::new(Some(failure_rx)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self
            .listener
            .local_addr()
            .map_err(jcop_remote_transport::Error::Io)?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle for stopping the server from another task
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Stop accepting connections
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Receive failed connections under [`ErrorPolicy::KeepServing`]
    ///
    /// Failures are queued from [`RemoteServer::bind`] on, so reports that
    /// happened before this call are delivered too. Returns `None` if the
    /// receiver was already taken.
    pub fn failures(&self) -> Option<mpsc::UnboundedReceiver<ConnectionFailure>> {
        self.failure_rx.lock().take()
    }

    /// Serve `logic` until [`RemoteServer::stop`] is called
    ///
    /// # Errors
    ///
    /// Under [`ErrorPolicy::Shutdown`], returns [`Error::Connection`] for the
    /// first connection that fails.
    pub async fn run<L>(&self, logic: L) -> Result<()>
    where
        L: CardLogic + 'static,
    {
        let logic = Arc::new(tokio::sync::Mutex::new(logic));
        let mut stop = self.handle.subscribe();
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<ConnectionFailure>();

        debug!("Accept loop started");

        loop {
            tokio::select! {
                biased;

                _ = stopped(&mut stop) => {
                    info!("Stop requested, leaving accept loop");
                    break;
                }

                Some(failure) = fatal_rx.recv() => {
                    return Err(Error::Connection {
                        peer: failure.peer,
                        source: Box::new(failure.error),
                    });
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        self.spawn_connection(socket, peer, Arc::clone(&logic), fatal_tx.clone());
                    }
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                    }
                },
            }
        }

        Ok(())
    }

    fn spawn_connection<L>(
        &self,
        socket: TcpStream,
        peer: SocketAddr,
        logic: Arc<tokio::sync::Mutex<L>>,
        fatal: mpsc::UnboundedSender<ConnectionFailure>,
    ) where
        L: CardLogic + 'static,
    {
        let max_payload = self.config.max_payload;
        let policy = self.config.error_policy;
        let sink = self.failure_tx.clone();

        info!("Client connected from {}", peer);

        tokio::spawn(async move {
            match serve_connection(socket, logic, max_payload).await {
                Ok(exchanges) => {
                    info!("Client {} disconnected after {} exchanges", peer, exchanges);
                }
                Err(error) => {
                    error!("Connection from {} failed: {}", peer, error);

                    let failure = ConnectionFailure { peer, error };
                    match policy {
                        ErrorPolicy::Shutdown => {
                            let _ = fatal.send(failure);
                        }
                        ErrorPolicy::KeepServing => {
                            // Only fails once the receiver was taken and dropped
                            let _ = sink.send(failure);
                        }
                    }
                }
            }
        });
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    // The sender lives in the server, so an error here means it is gone too
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Drive one connection through its whole lifecycle
///
/// Returns the number of commands relayed.
async fn serve_connection<L>(
    socket: TcpStream,
    logic: Arc<tokio::sync::Mutex<L>>,
    max_payload: usize,
) -> Result<u64>
where
    L: CardLogic,
{
    let _ = socket.set_nodelay(true);

    let mut logic = logic.lock_owned().await;
    let mut framed = FramedStream::with_max_payload(socket, max_payload);
    let mut connection = Connection::new();

    logic.connection_start().await.map_err(Error::Backend)?;

    let exchanged = exchange(&mut *logic, &mut framed, &mut connection).await;
    connection.close();

    let ended = logic.connection_end().await.map_err(Error::Backend);
    let _ = framed.shutdown().await;

    exchanged?;
    ended?;

    Ok(connection.exchanges())
}

async fn exchange<L>(
    logic: &mut L,
    framed: &mut FramedStream<TcpStream>,
    connection: &mut Connection,
) -> Result<()>
where
    L: CardLogic + ?Sized,
{
    let atr = logic.card_atr().await.map_err(Error::Backend)?;
    debug!("Sending ATR {}", hex::encode_upper(&atr));

    framed.write_frame(&Frame::new(FrameKind::Atr, DEFAULT_NODE, atr)).await?;
    connection.handshake_sent()?;

    while let Some(frame) = framed.read_frame().await? {
        match connection.receive(frame)? {
            Inbound::Exchange { node, command } => {
                let response = logic.exchange_apdu(command).await.map_err(Error::Backend)?;
                framed
                    .write_frame(&Frame::new(FrameKind::Apdu, node, response))
                    .await?;
            }
            Inbound::Ignore(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{CardEvent, ScriptedCard};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn bind_local(policy: ErrorPolicy) -> RemoteServer {
        RemoteServer::bind(ServerConfig::new("127.0.0.1", 0).with_error_policy(policy))
            .await
            .unwrap()
    }

    async fn connect(server: &RemoteServer) -> FramedStream<TcpStream> {
        let socket = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        FramedStream::new(socket)
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8050);
        assert_eq!(config.max_payload, 65535);
        assert_eq!(config.error_policy, ErrorPolicy::KeepServing);
    }

    #[test]
    fn test_handle_stop_is_idempotent() {
        let handle = ServerHandle::new();
        assert!(!handle.is_stopped());

        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_before_run_returns_immediately() {
        let server = bind_local(ErrorPolicy::KeepServing).await;
        server.stop();

        let result = timeout(Duration::from_secs(1), server.run(ScriptedCard::new(Bytes::new()))).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_failures_receiver_taken_once() {
        let server = bind_local(ErrorPolicy::KeepServing).await;
        assert!(server.failures().is_some());
        assert!(server.failures().is_none());
    }

    #[tokio::test]
    async fn test_server_ignores_unexpected_frames() {
        let server = Arc::new(bind_local(ErrorPolicy::KeepServing).await);
        let card = ScriptedCard::new(vec![0x3B]).respond(vec![0x90, 0x00]);
        let log = card.log();

        let running = Arc::clone(&server);
        let run = tokio::spawn(async move { running.run(card).await });

        let mut client = connect(&server).await;
        let atr = client.read_frame().await.unwrap().unwrap();
        assert_eq!(atr.kind, FrameKind::Atr);

        client.write_frame(&Frame::atr(vec![0x01])).await.unwrap();
        client
            .write_frame(&Frame::new(FrameKind::Other(0x42), 0, vec![0xFF]))
            .await
            .unwrap();
        client.write_frame(&Frame::new(FrameKind::Apdu, 1, vec![0x00, 0xB0])).await.unwrap();

        let reply = client.read_frame().await.unwrap().unwrap();
        assert_eq!(reply.kind, FrameKind::Apdu);
        assert_eq!(reply.node, 1);
        assert_eq!(reply.payload.as_ref(), &[0x90, 0x00]);

        client.shutdown().await.unwrap();
        assert!(client.read_frame().await.unwrap().is_none());

        assert_eq!(
            log.events(),
            vec![
                CardEvent::Start,
                CardEvent::Apdu(Bytes::from_static(&[0x00, 0xB0])),
                CardEvent::End,
            ]
        );

        server.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_serving() {
        let server = Arc::new(bind_local(ErrorPolicy::KeepServing).await);
        let mut failures = server.failures().unwrap();
        let card = ScriptedCard::new(vec![0x3B])
            .fail("card removed")
            .respond(vec![0x90, 0x00]);
        let log = card.log();

        let running = Arc::clone(&server);
        let run = tokio::spawn(async move { running.run(card).await });

        let mut first = connect(&server).await;
        first.read_frame().await.unwrap().unwrap();
        first.write_frame(&Frame::apdu(vec![1])).await.unwrap();

        // The server drops the connection instead of answering
        assert!(first.read_frame().await.unwrap().is_none());

        let failure = timeout(Duration::from_secs(1), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(failure.error, Error::Backend(_)));

        let mut second = connect(&server).await;
        second.read_frame().await.unwrap().unwrap();
        second.write_frame(&Frame::apdu(vec![2])).await.unwrap();
        let reply = second.read_frame().await.unwrap().unwrap();
        assert_eq!(reply.payload.as_ref(), &[0x90, 0x00]);
        second.shutdown().await.unwrap();
        assert!(second.read_frame().await.unwrap().is_none());

        assert_eq!(
            log.events(),
            vec![
                CardEvent::Start,
                CardEvent::Apdu(Bytes::from_static(&[1])),
                CardEvent::End,
                CardEvent::Start,
                CardEvent::Apdu(Bytes::from_static(&[2])),
                CardEvent::End,
            ]
        );

        server.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failures_reported_before_receiver_taken() {
        let server = Arc::new(bind_local(ErrorPolicy::KeepServing).await);
        let card = ScriptedCard::new(vec![0x3B]).fail("card removed");
        let log = card.log();

        let running = Arc::clone(&server);
        let run = tokio::spawn(async move { running.run(card).await });

        let mut client = connect(&server).await;
        client.read_frame().await.unwrap().unwrap();
        client.write_frame(&Frame::apdu(vec![1])).await.unwrap();
        assert!(client.read_frame().await.unwrap().is_none());

        // Nobody is listening for failures while the connection dies
        timeout(Duration::from_secs(1), async {
            while log.events().last() != Some(&CardEvent::End) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let mut failures = server.failures().unwrap();
        let failure = timeout(Duration::from_secs(1), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(failure.error, Error::Backend(_)));
        assert!(failure.peer.ip().is_loopback());

        server.stop();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_backend_failure_with_shutdown_policy() {
        let server = Arc::new(bind_local(ErrorPolicy::Shutdown).await);
        let card = ScriptedCard::new(vec![0x3B]).fail("card removed");

        let running = Arc::clone(&server);
        let run = tokio::spawn(async move { running.run(card).await });

        let mut client = connect(&server).await;
        client.read_frame().await.unwrap().unwrap();
        client.write_frame(&Frame::apdu(vec![1])).await.unwrap();

        let result = timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
        match result {
            Err(Error::Connection { source, .. }) => {
                assert!(matches!(*source, Error::Backend(_)));
            }
            other => panic!("Expected connection failure, got {:?}", other),
        }
    }
}
