//! Query-time traversal of a persisted index.

mod ranked;
mod traversal;

pub use ranked::{RankedList, Scored};
pub use traversal::Retriever;
