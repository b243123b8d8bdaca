use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CanopyError, Result};

/// Role of a persisted node within the index tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Root of an index whose tree has children.
    Document,
    /// Internal node below the root.
    DocumentSection,
    /// Root of an index that is a single short text (no children).
    TextDocument,
    /// Leaf chunk.
    Text,
}

impl NodeType {
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeType::Text | NodeType::TextDocument)
    }
}

/// Reference to a child node: where to load it from, and a short summary of
/// what it contains. References resolve relative to the store that wrote
/// them, enabling independent lazy loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    pub reference: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Unix seconds at creation.
    pub created: i64,
    /// Unix seconds at last full rewrite. Nodes are never patched in place.
    pub updated: i64,
    /// Provenance of the originating document (path, URL, ...).
    pub source: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

impl NodeMeta {
    pub fn now(source: impl Into<String>, node_type: NodeType) -> Self {
        let ts = Utc::now().timestamp();
        Self {
            created: ts,
            updated: ts,
            source: source.into(),
            node_type,
        }
    }
}

/// One persisted index node. Internal nodes carry child references and no
/// body text; leaves carry body text and no children. Immutable once
/// written.
///
/// The wire format is a flat JSON record with fields `children` (array of
/// `{reference, summary}`), `created`, `updated`, `source`, `type`, `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    pub children: Vec<ChildRef>,
    #[serde(flatten)]
    pub meta: NodeMeta,
    pub text: String,
}

impl IndexNode {
    pub fn internal(children: Vec<ChildRef>, meta: NodeMeta) -> Self {
        Self {
            children,
            meta,
            text: String::new(),
        }
    }

    pub fn leaf(meta: NodeMeta, text: impl Into<String>) -> Self {
        Self {
            children: Vec::new(),
            meta,
            text: text.into(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Enforce the structural invariant: a leaf type iff no children, body
    /// text iff no children.
    pub fn validate(&self) -> Result<()> {
        if self.meta.node_type.is_leaf() != self.children.is_empty() {
            return Err(CanopyError::InvalidNode(format!(
                "node type {:?} inconsistent with {} children",
                self.meta.node_type,
                self.children.len()
            )));
        }
        if self.children.is_empty() && self.text.is_empty() {
            return Err(CanopyError::InvalidNode(
                "leaf node with empty text".to_string(),
            ));
        }
        if !self.children.is_empty() && !self.text.is_empty() {
            return Err(CanopyError::InvalidNode(
                "internal node with body text".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a single node from `reference`. Never loads the subtree below
    /// it; children are fetched on demand through their own references.
    pub async fn read_from(reference: &str) -> Result<Self> {
        let raw = match tokio::fs::read_to_string(reference).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CanopyError::NotFound(reference.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let node: IndexNode = serde_json::from_str(&raw)?;
        node.validate()?;
        Ok(node)
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn internal_node() -> IndexNode {
        IndexNode::internal(
            vec![ChildRef {
                reference: "child1".to_string(),
                summary: "This is a child node".to_string(),
            }],
            NodeMeta {
                created: 0,
                updated: 1,
                source: "test".to_string(),
                node_type: NodeType::Document,
            },
        )
    }

    #[test]
    fn test_wire_format_field_names() {
        let value = serde_json::to_value(internal_node()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "children": [{"reference": "child1", "summary": "This is a child node"}],
                "text": "",
                "created": 0,
                "updated": 1,
                "source": "test",
                "type": "DOCUMENT"
            })
        );
    }

    #[test]
    fn test_node_type_wire_names() {
        for (ty, name) in [
            (NodeType::Document, "\"DOCUMENT\""),
            (NodeType::DocumentSection, "\"DOCUMENT_SECTION\""),
            (NodeType::TextDocument, "\"TEXT_DOCUMENT\""),
            (NodeType::Text, "\"TEXT\""),
        ] {
            assert_eq!(serde_json::to_string(&ty).unwrap(), name);
        }
    }

    #[test]
    fn test_json_round_trip_equality() {
        let node = internal_node();
        let raw = serde_json::to_string(&node).unwrap();
        let parsed: IndexNode = serde_json::from_str(&raw).unwrap();
        assert_eq!(node, parsed);
    }

    #[test]
    fn test_validate_rejects_leaf_type_with_children() {
        let mut node = internal_node();
        node.meta.node_type = NodeType::Text;
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_internal_with_body_text() {
        let mut node = internal_node();
        node.text = "stray text".to_string();
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_leaf() {
        let node = IndexNode::leaf(NodeMeta::now("test", NodeType::Text), "");
        assert!(node.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_both_roles() {
        internal_node().validate().unwrap();
        IndexNode::leaf(NodeMeta::now("test", NodeType::Text), "a chunk")
            .validate()
            .unwrap();
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_kg.json");
        let node = internal_node();
        node.write_to(&path).await.unwrap();
        let loaded = IndexNode::read_from(path.to_str().unwrap()).await.unwrap();
        assert_eq!(node, loaded);
    }

    #[tokio::test]
    async fn test_read_missing_reference_is_not_found() {
        let err = IndexNode::read_from("/nonexistent/path_kg.json")
            .await
            .unwrap_err();
        assert!(matches!(err, CanopyError::NotFound(_)));
    }
}
