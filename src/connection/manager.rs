//! Connection manager owning the single socket to the board

use crate::config::NetworkConfig;
use crate::error::LinkError;
use crate::events::{EventSender, LinkEvent};
use crate::transport::{TcpConnector, TransportConnector, TransportStream};
use board_protocol::hex_dump;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Owns the socket handle and serializes every access to it
///
/// Connect, disconnect, status checks and each send+receive exchange all
/// take the same lock, so a disconnect can never tear the socket out from
/// under an exchange in flight.
pub struct ConnectionManager {
    config: NetworkConfig,
    stream: Mutex<Option<Box<dyn TransportStream>>>,
    event_tx: EventSender,
}

impl ConnectionManager {
    pub fn new(config: NetworkConfig, event_tx: EventSender) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
            event_tx,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Connect over TCP, closing any existing connection first
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), LinkError> {
        let connector = TcpConnector::new(host, port, self.config.connect_timeout());
        self.connect_with(&connector).await
    }

    /// Connect using an arbitrary transport
    pub async fn connect_with<C: TransportConnector>(&self, connector: &C) -> Result<(), LinkError> {
        let mut guard = self.stream.lock().await;

        let was_connected = match guard.take() {
            Some(mut old) => {
                debug!("[LINK] Closing previous connection to {}", old.peer());
                let _ = old.close().await;
                true
            }
            None => false,
        };

        match connector.connect().await {
            Ok(stream) => {
                info!("[LINK] Connected via {} to {}", connector.name(), stream.peer());
                *guard = Some(Box::new(stream));
                self.emit(LinkEvent::ConnectionStatusChanged { connected: true });
                Ok(())
            }
            Err(e) => {
                error!("[LINK] {}", e);
                if was_connected {
                    self.emit(LinkEvent::ConnectionStatusChanged { connected: false });
                }
                self.emit(LinkEvent::ConnectionError {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Close the connection; a no-op when already disconnected
    ///
    /// Returns whether a connection was actually closed.
    pub async fn disconnect(&self) -> bool {
        let mut guard = self.stream.lock().await;
        match guard.take() {
            Some(mut stream) => {
                let _ = stream.close().await;
                info!("[LINK] Disconnected from {}", stream.peer());
                self.emit(LinkEvent::ConnectionStatusChanged { connected: false });
                true
            }
            None => false,
        }
    }

    /// Snapshot of the connection state
    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Send one frame and wait for one read of the response
    ///
    /// Send and receive happen under one lock acquisition, which is what keeps
    /// responses paired with their requests. A timeout leaves the connection
    /// up; any other I/O failure drops it.
    pub async fn exchange(&self, frame: &[u8]) -> Result<Bytes, LinkError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(LinkError::NotConnected)?;

        debug!("[LINK] >> {}", hex_dump(frame));
        let result = transfer(
            stream,
            frame,
            self.config.socket_timeout(),
            self.config.receive_buffer,
        )
        .await;

        match &result {
            Ok(response) => debug!("[LINK] << {}", hex_dump(response)),
            Err(e) if e.is_fatal() => {
                warn!("[LINK] Dropping connection: {}", e);
                if let Some(mut stream) = guard.take() {
                    let _ = stream.close().await;
                }
                self.emit(LinkEvent::ConnectionStatusChanged { connected: false });
            }
            Err(_) => {}
        }

        result
    }

    fn emit(&self, event: LinkEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Discard bytes already waiting on the socket without blocking
///
/// A reply that arrived after its exchange timed out would otherwise be read
/// as the response to the next request.
async fn drain_stale(stream: &mut Box<dyn TransportStream>, scratch: &mut [u8]) -> Result<usize, LinkError> {
    let mut discarded = 0;
    loop {
        // A zero timeout still polls the read once
        match timeout(Duration::ZERO, stream.read(scratch)).await {
            Ok(Ok(0)) => return Err(LinkError::Communication("connection closed by board".into())),
            Ok(Ok(n)) => {
                debug!("[LINK] Discarding {} stale bytes: {}", n, hex_dump(&scratch[..n]));
                discarded += n;
            }
            Ok(Err(e)) => return Err(LinkError::Communication(format!("receive failed: {}", e))),
            Err(_) => return Ok(discarded),
        }
    }
}

async fn transfer(
    stream: &mut Box<dyn TransportStream>,
    frame: &[u8],
    io_timeout: Duration,
    receive_buffer: usize,
) -> Result<Bytes, LinkError> {
    let mut buf = vec![0u8; receive_buffer];
    drain_stale(stream, &mut buf).await?;

    match timeout(io_timeout, stream.write_all(frame)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(LinkError::Communication(format!("send failed: {}", e))),
        Err(_) => return Err(LinkError::Timeout(io_timeout)),
    }

    match timeout(io_timeout, stream.read(&mut buf)).await {
        Ok(Ok(0)) => Err(LinkError::Communication("connection closed by board".into())),
        Ok(Ok(n)) => {
            buf.truncate(n);
            Ok(Bytes::from(buf))
        }
        Ok(Err(e)) => Err(LinkError::Communication(format!("receive failed: {}", e))),
        Err(_) => Err(LinkError::Timeout(io_timeout)),
    }
}
