//! Events published to whoever drives the link (CLI, UI)

use crate::command::TaskContext;
use crate::error::LinkError;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Events emitted by the connection manager, dispatcher and poller
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Socket opened or closed
    ConnectionStatusChanged { connected: bool },
    /// A connect attempt failed
    ConnectionError { reason: String },
    /// A queued task was dropped without a response
    TaskFailed {
        error: LinkError,
        context: Option<TaskContext>,
    },
    /// Raw response paired with the context of the task it answered
    ResponseReceived {
        response: Bytes,
        context: Option<TaskContext>,
    },
    /// Elapsed polling time as `HH:MM:SS`
    StatusUpdated { runtime: String },
    /// The poller could not enqueue its status queries
    StatusError { reason: String },
}

pub type EventSender = mpsc::UnboundedSender<LinkEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Create the channel events are published on
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
