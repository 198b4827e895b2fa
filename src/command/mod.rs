//! Outbound command path to the board
//!
//! This module handles:
//! - Building request frames with the context their response needs
//! - Parsing operator-typed raw bytes
//! - Queueing tasks from any number of producers
//! - Serializing all wire traffic through one dispatcher loop

pub mod custom;
mod dispatcher;
pub mod requests;
mod task;

pub use dispatcher::{CommandDispatcher, DispatchStats};
pub use task::{task_queue, Task, TaskContext, TaskReceiver, TaskSender};
