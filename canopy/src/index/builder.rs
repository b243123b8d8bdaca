use futures::future::BoxFuture;

use crate::error::{CanopyError, Result};
use crate::oracle::Oracle;

/// Separator between child summaries in an internal node's text.
pub const SUMMARY_SEPARATOR: &str = "\nAND\n";

/// Splitting configuration, fixed for a whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitParams {
    /// Maximum chunk size, in characters.
    pub chunk_length: usize,
    /// Characters shared between consecutive chunks. Must be strictly less
    /// than `chunk_length`.
    pub chunk_overlap: usize,
    /// Maximum fan-out per tree level. Must be at least 1.
    pub max_subtopics: usize,
}

impl SplitParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_length == 0 {
            return Err(CanopyError::Config(
                "chunk_length must be at least 1".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_length {
            return Err(CanopyError::Config(format!(
                "chunk_overlap ({}) must be strictly less than chunk_length ({})",
                self.chunk_overlap, self.chunk_length
            )));
        }
        if self.max_subtopics == 0 {
            return Err(CanopyError::Config(
                "max_subtopics must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Offset between consecutive chunk starts.
    fn stride(&self) -> usize {
        self.chunk_length - self.chunk_overlap
    }
}

/// One node of the in-memory topic tree: either a leaf holding a raw text
/// chunk, or an internal node owning its subtopics. Internal node text is
/// empty until the summarization pass fills it with child summaries.
#[derive(Debug, Clone)]
pub struct TopicNode {
    subtopics: Vec<TopicNode>,
    text: String,
    source: String,
}

impl TopicNode {
    fn leaf(text: String, source: &str) -> Self {
        Self {
            subtopics: Vec::new(),
            text,
            source: source.to_string(),
        }
    }

    fn internal(subtopics: Vec<TopicNode>, source: &str) -> Self {
        Self {
            subtopics,
            text: String::new(),
            source: source.to_string(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.subtopics.is_empty()
    }

    pub fn num_subtopics(&self) -> usize {
        self.subtopics.len()
    }

    pub fn subtopic(&self, index: usize) -> Option<&TopicNode> {
        self.subtopics.get(index)
    }

    pub fn subtopics(&self) -> &[TopicNode] {
        &self.subtopics
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Bottom-up summarization pass, strict post-order: every descendant's
    /// text is finalized before its parent's text is computed from child
    /// summaries. Leaves keep their chunk text. Oracle failures propagate;
    /// a node is never left with a silently empty description.
    pub fn describe<'a>(&'a mut self, oracle: &'a dyn Oracle) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.text.is_empty() {
                return Ok(());
            }
            let mut text = String::new();
            for subtopic in &mut self.subtopics {
                subtopic.describe(oracle).await?;
                let summary = oracle.summarize(&subtopic.text).await?;
                text.push_str(&summary);
                text.push_str(SUMMARY_SEPARATOR);
            }
            self.text = text;
            Ok(())
        })
    }
}

/// Recursively partitions input documents into a [`TopicNode`] tree of
/// bounded-size chunks with bounded fan-out. Performs no disk I/O.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    params: SplitParams,
    source: String,
}

impl TreeBuilder {
    pub fn new(params: SplitParams, source: impl Into<String>) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            source: source.into(),
        })
    }

    pub fn params(&self) -> SplitParams {
        self.params
    }

    /// Partition `documents` into a tree. Structure only; run
    /// [`TopicNode::describe`] afterwards to fill internal-node text.
    pub fn build(&self, documents: Vec<String>) -> Result<TopicNode> {
        if documents.is_empty() {
            return Err(CanopyError::Config(
                "at least one input document is required".to_string(),
            ));
        }
        Ok(self.build_node(documents))
    }

    fn build_node(&self, documents: Vec<String>) -> TopicNode {
        let p = &self.params;

        if documents.len() == 1 {
            let doc_len = documents[0].chars().count();

            if doc_len <= p.chunk_length {
                let doc = documents.into_iter().next().unwrap_or_default();
                return TopicNode::leaf(doc, &self.source);
            }

            let chunks = self.split_document(&documents[0]);
            tracing::debug!(
                doc_len,
                chunks = chunks.len(),
                "split document into chunks"
            );

            // A very long document gets one level of wrapping: the chunk
            // list becomes a single child subtree, keeping fan-out per
            // level within max_subtopics.
            if doc_len > p.stride() * p.max_subtopics {
                return TopicNode::internal(vec![self.build_node(chunks)], &self.source);
            }

            let subtopics = chunks
                .into_iter()
                .map(|chunk| self.build_node(vec![chunk]))
                .collect();
            return TopicNode::internal(subtopics, &self.source);
        }

        if documents.len() > p.max_subtopics {
            let per_group = documents.len().div_ceil(p.max_subtopics);
            let subtopics = documents
                .chunks(per_group)
                .map(|group| self.build_node(group.to_vec()))
                .collect();
            return TopicNode::internal(subtopics, &self.source);
        }

        let subtopics = documents
            .into_iter()
            .map(|doc| self.build_node(vec![doc]))
            .collect();
        TopicNode::internal(subtopics, &self.source)
    }

    /// Character-based split: chunk i starts at char offset `i * stride`
    /// and runs for up to `chunk_length` chars. Chunk starts range over
    /// `0 .. len - 1`, so the final chunk may be shorter but is never
    /// degenerate for stride-aligned lengths.
    fn split_document(&self, document: &str) -> Vec<String> {
        let chars: Vec<char> = document.chars().collect();
        let stride = self.params.stride();
        let mut chunks = Vec::new();
        let mut start = 0;
        while start + 1 < chars.len() {
            let end = (start + self.params.chunk_length).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            start += stride;
        }
        chunks
    }
}
