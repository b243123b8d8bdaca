//! Building and persisting the hierarchical document index.

mod builder;
mod node;
mod store;

pub use builder::{SplitParams, TopicNode, TreeBuilder, SUMMARY_SEPARATOR};
pub use node::{ChildRef, IndexNode, NodeMeta, NodeType};
pub use store::NodeStore;
