//! Errors raised while talking to the board

use board_protocol::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Failures of a connect or of a single request/response exchange
///
/// `Clone` so a failure can be carried inside a [`crate::events::LinkEvent`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Not connected to board")]
    NotConnected,

    #[error("Board did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl LinkError {
    /// True when the failure also dropped the connection
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Communication(_))
    }
}
