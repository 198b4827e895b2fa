//! Operator client for the TCP forwarding board
//!
//! `BoardLink` owns one connection to the board, serializes every request
//! through a single dispatcher loop, polls temperature and voltage in the
//! background and reports everything on one event channel.

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod link;
pub mod logging;
pub mod polling;
pub mod response;
pub mod transport;

pub use config::LinkConfig;
pub use error::LinkError;
pub use events::{EventReceiver, LinkEvent};
pub use link::BoardLink;
