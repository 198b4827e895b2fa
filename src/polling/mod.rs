//! Status Polling
//!
//! Injects temperature and voltage queries into the dispatcher queue on a
//! fixed cadence while the board is connected.

mod poller;

pub use poller::{format_runtime, PollerHandle, StatusPoller};
