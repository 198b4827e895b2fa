//! Response handling
//!
//! Classifies raw board responses by the context of the request that
//! produced them and keeps bounded status histories.

mod classifier;
mod history;

pub use classifier::{be_value, Classification, ClassificationError, ResponseClassifier};
pub use history::History;
