use std::path::{Path, PathBuf};

use futures::future::BoxFuture;

use crate::error::Result;
use crate::index::builder::TopicNode;
use crate::index::node::{ChildRef, IndexNode, NodeMeta, NodeType};
use crate::oracle::Oracle;

/// Directory-rooted store of persisted index nodes, one JSON file per node.
///
/// A node named `n` lives at `<directory>/<n>_kg.json`; a child at index i
/// of node `n` is named `n.i`. The `.` delimiter keeps sibling indices from
/// colliding however large the fan-out gets (bare concatenation would map
/// child "1" of "x1" and child "11" of "x" to the same path).
#[derive(Debug, Clone)]
pub struct NodeStore {
    directory: PathBuf,
}

impl NodeStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Reference string for the node named `name`.
    pub fn reference_for(&self, name: &str) -> String {
        self.directory
            .join(format!("{name}_kg.json"))
            .to_string_lossy()
            .into_owned()
    }

    /// Load one node by reference. Never loads the subtree below it.
    pub async fn read(&self, reference: &str) -> Result<IndexNode> {
        IndexNode::read_from(reference).await
    }

    /// Persist a described tree rooted at the name `prefix`, returning the
    /// root reference. Every child subtree is durable before the parent
    /// file referencing it is written, so a concurrent reader can never
    /// follow a reference to a not-yet-written node. Child summaries are
    /// obtained from the oracle as each child is recorded.
    pub async fn write_tree(
        &self,
        tree: &TopicNode,
        prefix: &str,
        oracle: &dyn Oracle,
    ) -> Result<String> {
        tokio::fs::create_dir_all(&self.directory).await?;
        self.write_node(tree, prefix, true, oracle).await?;
        Ok(self.reference_for(prefix))
    }

    fn write_node<'a>(
        &'a self,
        node: &'a TopicNode,
        name: &'a str,
        is_root: bool,
        oracle: &'a dyn Oracle,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let reference = self.reference_for(name);

            if node.is_leaf() {
                let node_type = if is_root {
                    NodeType::TextDocument
                } else {
                    NodeType::Text
                };
                let record =
                    IndexNode::leaf(NodeMeta::now(node.source(), node_type), node.text());
                record.validate()?;
                record.write_to(&reference).await?;
                tracing::debug!(reference = %reference, "wrote leaf node");
                return Ok(());
            }

            let node_type = if is_root {
                NodeType::Document
            } else {
                NodeType::DocumentSection
            };

            let mut children = Vec::with_capacity(node.num_subtopics());
            for (i, subtopic) in node.subtopics().iter().enumerate() {
                let child_name = format!("{name}.{i}");
                self.write_node(subtopic, &child_name, false, oracle).await?;
                children.push(ChildRef {
                    reference: self.reference_for(&child_name),
                    summary: oracle.summarize(subtopic.text()).await?,
                });
            }

            let record = IndexNode::internal(children, NodeMeta::now(node.source(), node_type));
            record.validate()?;
            record.write_to(&reference).await?;
            tracing::debug!(reference = %reference, children = node.num_subtopics(), "wrote internal node");
            Ok(())
        })
    }
}
