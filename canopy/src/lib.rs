//! canopy — a hierarchical, disk-persisted document index with greedy,
//! memory-bounded best-first retrieval.
//!
//! Documents are recursively partitioned into a tree of bounded-size
//! chunks; internal nodes carry short semantic summaries of their children,
//! leaves carry raw text. At query time the tree is walked top-down,
//! ranking children through an injected [`oracle::Oracle`] and expanding
//! only the most promising ones under a strict memory bound.

pub mod config;
pub mod error;
pub mod index;
pub mod oracle;
pub mod retrieval;

pub use config::Config;
pub use error::{CanopyError, Result};
