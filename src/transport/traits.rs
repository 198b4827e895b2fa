//! Transport trait abstraction for the board link

use crate::error::LinkError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A transport stream that can read and write bytes
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the transport gracefully
    async fn close(&mut self) -> Result<(), LinkError>;

    /// Remote end, for log lines
    fn peer(&self) -> String;
}

/// Factory for creating transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// The stream type this connector produces
    type Stream: TransportStream;

    /// Attempt to connect, returning a stream on success
    async fn connect(&self) -> Result<Self::Stream, LinkError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
