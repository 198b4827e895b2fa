//! TCP transport to the forwarding board

use crate::error::LinkError;
use crate::transport::traits::{TransportConnector, TransportStream};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP stream wrapper implementing TransportStream
pub struct TcpTransportStream {
    inner: TcpStream,
    peer: String,
}

impl TcpTransportStream {
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        Self {
            inner: stream,
            peer,
        }
    }
}

impl AsyncRead for TcpTransportStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransportStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl TransportStream for TcpTransportStream {
    async fn close(&mut self) -> Result<(), LinkError> {
        tokio::io::AsyncWriteExt::shutdown(&mut self.inner)
            .await
            .map_err(|e| LinkError::Communication(e.to_string()))
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// TCP connector with a bounded connect time
pub struct TcpConnector {
    address: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: &str, port: u16, connect_timeout: Duration) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            connect_timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    type Stream = TcpTransportStream;

    async fn connect(&self) -> Result<Self::Stream, LinkError> {
        let stream = match timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(LinkError::Connection(format!("{}: {}", self.address, e)));
            }
            Err(_) => {
                return Err(LinkError::Connection(format!(
                    "{}: timed out after {:?}",
                    self.address, self.connect_timeout
                )));
            }
        };

        // Frames are tiny request/response pairs
        let _ = stream.set_nodelay(true);
        Ok(TcpTransportStream::new(stream))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_connector_address() {
        let connector = TcpConnector::new("127.0.0.1", 9420, Duration::from_secs(3));
        assert_eq!(connector.address(), "127.0.0.1:9420");
        assert_eq!(connector.name(), "TCP");
    }

    #[tokio::test]
    async fn test_connect_records_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connector = TcpConnector::new("127.0.0.1", addr.port(), Duration::from_secs(1));
        let stream = connector.connect().await.expect("connect failed");
        assert_eq!(stream.peer(), addr.to_string());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port, then close the listener so nothing is there
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let connector = TcpConnector::new("127.0.0.1", port, Duration::from_secs(1));
        let err = connector.connect().await.err().expect("connect should fail");
        assert!(matches!(err, LinkError::Connection(_)));
    }
}
