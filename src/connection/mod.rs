//! Connection management for the board link
//!
//! This module handles:
//! - Opening and closing the single TCP connection to the board
//! - Serializing socket access between the dispatcher and status checks
//! - Detecting a connection lost mid-exchange

mod manager;

pub use manager::ConnectionManager;
