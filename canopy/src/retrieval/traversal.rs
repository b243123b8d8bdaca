use std::sync::Arc;

use futures::future::try_join_all;

use crate::error::{CanopyError, Result};
use crate::index::{IndexNode, NodeStore};
use crate::oracle::{validate_score, Oracle, ScoreContext};
use crate::retrieval::ranked::RankedList;

/// Greedy, memory-bounded best-first traversal of a persisted index.
///
/// This is a beam search, not an exhaustive one: at every internal node the
/// children are ranked by oracle relevance and only the most promising
/// prefix is expanded, so the result set trades global optimality for a
/// bounded frontier and a bounded number of oracle calls. With a
/// deterministic oracle, the traversal and its results are fully
/// deterministic.
#[derive(Clone)]
pub struct Retriever {
    store: NodeStore,
    oracle: Arc<dyn Oracle>,
    max_memory_nodes: usize,
    relevance_threshold: f64,
    persona: Option<String>,
}

impl Retriever {
    pub fn new(
        store: NodeStore,
        oracle: Arc<dyn Oracle>,
        max_memory_nodes: usize,
        relevance_threshold: f64,
    ) -> Result<Self> {
        if max_memory_nodes == 0 {
            return Err(CanopyError::Config(
                "max_memory_nodes must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&relevance_threshold) {
            return Err(CanopyError::Config(format!(
                "relevance_threshold {relevance_threshold} outside [0, 1]"
            )));
        }
        Ok(Self {
            store,
            oracle,
            max_memory_nodes,
            relevance_threshold,
            persona: None,
        })
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Walk the index from `root_reference` and return the texts of the
    /// most relevant leaves, highest-scored first.
    ///
    /// A reference that fails to load fails the whole call: a corrupt index
    /// surfaces immediately instead of silently thinning the results.
    pub async fn retrieve(&self, question: &str, root_reference: &str) -> Result<Vec<String>> {
        // The root is always explored.
        let mut frontier: RankedList<String> = RankedList::unbounded();
        frontier.insert(1.0, root_reference.to_string());

        let mut results: RankedList<IndexNode> = RankedList::bounded(self.max_memory_nodes);

        while let Some(entry) = frontier.pop_front() {
            let node = self.store.read(&entry.payload).await?;

            if node.is_leaf() {
                let score = self.score(question, &node.text).await?;
                tracing::debug!(reference = %entry.payload, score, "scored leaf");
                results.insert(score, node);
            } else {
                self.expand(question, &node, &mut frontier).await?;
            }

            frontier.truncate(self.max_memory_nodes);
        }

        Ok(results
            .into_payloads()
            .into_iter()
            .map(|node| node.text)
            .collect())
    }

    /// Rank an internal node's children and promote the promising prefix
    /// into the frontier. The single best child is always promoted, even at
    /// or below the threshold; otherwise an irrelevant-looking level could
    /// starve the entire search.
    async fn expand(
        &self,
        question: &str,
        node: &IndexNode,
        frontier: &mut RankedList<String>,
    ) -> Result<()> {
        // Children are scored concurrently, but inserted in child order so
        // tie-breaking never depends on call completion order.
        let scores = try_join_all(
            node.children
                .iter()
                .map(|child| self.score(question, &child.summary)),
        )
        .await?;

        let mut ranked: RankedList<&str> = RankedList::unbounded();
        for (child, score) in node.children.iter().zip(scores) {
            tracing::debug!(reference = %child.reference, score, "scored child summary");
            ranked.insert(score, child.reference.as_str());
        }

        if let Some(best) = ranked.pop_front() {
            frontier.insert(best.score, best.payload.to_string());
        }
        while ranked
            .front_score()
            .is_some_and(|score| score > self.relevance_threshold)
        {
            if let Some(next) = ranked.pop_front() {
                frontier.insert(next.score, next.payload.to_string());
            }
        }
        Ok(())
    }

    async fn score(&self, question: &str, text: &str) -> Result<f64> {
        let ctx = ScoreContext {
            persona: self.persona.as_deref(),
            question,
            text,
        };
        validate_score(self.oracle.score(&ctx).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{SplitParams, TreeBuilder};
    use crate::oracle::stub::StubOracle;
    use pretty_assertions::assert_eq;

    const QUESTION: &str = "what do cats do?";

    /// Writes a one-level index of three leaf documents and returns
    /// (store, root reference). Summaries produced by the stub oracle are
    /// "sum[" + first 8 chars + "]".
    async fn flat_index(dir: &std::path::Path) -> (NodeStore, String) {
        let builder = TreeBuilder::new(
            SplitParams {
                chunk_length: 100,
                chunk_overlap: 2,
                max_subtopics: 5,
            },
            "test",
        )
        .unwrap();
        let mut tree = builder
            .build(vec![
                "cats are great".to_string(),
                "dogs are loud".to_string(),
                "fish are quiet".to_string(),
            ])
            .unwrap();
        let oracle = StubOracle::new(0.5);
        tree.describe(&oracle).await.unwrap();
        let store = NodeStore::new(dir);
        let root = store.write_tree(&tree, "root", &oracle).await.unwrap();
        (store, root)
    }

    fn scoring_oracle() -> StubOracle {
        StubOracle::new(0.0)
            .with_score("sum[cats are]", 0.9)
            .with_score("sum[dogs are]", 0.4)
            .with_score("sum[fish are]", 0.05)
            .with_score("cats are great", 0.95)
            .with_score("dogs are loud", 0.5)
            .with_score("fish are quiet", 0.1)
    }

    fn retriever(store: NodeStore, oracle: StubOracle, max_nodes: usize, threshold: f64) -> Retriever {
        Retriever::new(store, Arc::new(oracle), max_nodes, threshold).unwrap()
    }

    #[test]
    fn test_rejects_zero_memory_bound() {
        let store = NodeStore::new("unused");
        assert!(Retriever::new(store, Arc::new(StubOracle::new(0.5)), 0, 0.1).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let store = NodeStore::new("unused");
        assert!(Retriever::new(store, Arc::new(StubOracle::new(0.5)), 10, 1.5).is_err());
    }

    #[tokio::test]
    async fn test_retrieves_relevant_leaves_in_score_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        let retriever = retriever(store, scoring_oracle(), 10, 0.1);
        let texts = retriever.retrieve(QUESTION, &root).await.unwrap();

        // fish scored 0.05 <= threshold, so its subtree is never expanded.
        assert_eq!(texts, vec!["cats are great", "dogs are loud"]);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        // dogs summary lands exactly at the threshold: not promoted.
        let oracle = StubOracle::new(0.0)
            .with_score("sum[cats are]", 0.9)
            .with_score("sum[dogs are]", 0.4)
            .with_score("sum[fish are]", 0.05)
            .with_score("cats are great", 0.95);
        let retriever = retriever(store, oracle, 10, 0.4);
        let texts = retriever.retrieve(QUESTION, &root).await.unwrap();
        assert_eq!(texts, vec!["cats are great"]);
    }

    #[tokio::test]
    async fn test_top_child_explored_even_below_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        // Every child is far below the threshold; the best one must still
        // be expanded so the search cannot starve.
        let oracle = StubOracle::new(0.0)
            .with_score("sum[cats are]", 0.05)
            .with_score("sum[dogs are]", 0.03)
            .with_score("sum[fish are]", 0.01)
            .with_score("cats are great", 0.9);
        let retriever = retriever(store, oracle, 10, 0.5);
        let texts = retriever.retrieve(QUESTION, &root).await.unwrap();
        assert_eq!(texts, vec!["cats are great"]);
    }

    #[tokio::test]
    async fn test_result_list_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        let oracle = StubOracle::new(0.0)
            .with_score("sum[cats are]", 0.9)
            .with_score("sum[dogs are]", 0.8)
            .with_score("sum[fish are]", 0.7)
            .with_score("cats are great", 0.95)
            .with_score("dogs are loud", 0.5)
            .with_score("fish are quiet", 0.6);
        let retriever = retriever(store, oracle, 2, 0.1);
        let texts = retriever.retrieve(QUESTION, &root).await.unwrap();

        // Three leaves qualify but only the top two fit the bound. The
        // frontier itself is also capped at two, which drops the fish
        // reference before it is ever loaded.
        assert_eq!(texts, vec!["cats are great", "dogs are loud"]);
    }

    #[tokio::test]
    async fn test_retrieval_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        let retriever = retriever(store, scoring_oracle(), 10, 0.01);
        let first = retriever.retrieve(QUESTION, &root).await.unwrap();
        let second = retriever.retrieve(QUESTION, &root).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_equal_scores_keep_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        // All summaries and all leaves tie: results follow child order.
        let oracle = StubOracle::new(0.0)
            .with_score("sum[cats are]", 0.6)
            .with_score("sum[dogs are]", 0.6)
            .with_score("sum[fish are]", 0.6)
            .with_score("cats are great", 0.5)
            .with_score("dogs are loud", 0.5)
            .with_score("fish are quiet", 0.5);
        let retriever = retriever(store, oracle, 10, 0.1);
        let texts = retriever.retrieve(QUESTION, &root).await.unwrap();
        assert_eq!(
            texts,
            vec!["cats are great", "dogs are loud", "fish are quiet"]
        );
    }

    #[tokio::test]
    async fn test_nested_index_reaches_deep_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let builder = TreeBuilder::new(
            SplitParams {
                chunk_length: 9,
                chunk_overlap: 2,
                max_subtopics: 5,
            },
            "test",
        )
        .unwrap();
        let mut tree = builder
            .build(vec![
                "here's a big old sentence for you to split up lol".to_string(),
            ])
            .unwrap();
        let build_oracle = StubOracle::new(0.5);
        tree.describe(&build_oracle).await.unwrap();
        let store = NodeStore::new(dir.path());
        let root = store.write_tree(&tree, "root", &build_oracle).await.unwrap();

        // Every summary scores high enough to expand; every leaf scores by
        // default. The traversal must reach actual chunk texts.
        let oracle = StubOracle::new(0.8);
        let retriever = retriever(store, oracle, 20, 0.1);
        let texts = retriever.retrieve(QUESTION, &root).await.unwrap();
        assert!(texts.contains(&"here's a ".to_string()));
        assert!(texts.contains(&" up lol".to_string()));
    }

    #[tokio::test]
    async fn test_missing_reference_fails_the_call() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        // Corrupt the index: remove the node the top child points at.
        let root_node = store.read(&root).await.unwrap();
        tokio::fs::remove_file(&root_node.children[0].reference)
            .await
            .unwrap();

        let retriever = retriever(store, scoring_oracle(), 10, 0.1);
        let err = retriever.retrieve(QUESTION, &root).await.unwrap_err();
        assert!(matches!(err, CanopyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_oracle_score_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (store, root) = flat_index(dir.path()).await;

        let oracle = StubOracle::new(0.0).with_score("sum[cats are]", 1.7);
        let retriever = retriever(store, oracle, 10, 0.1);
        let err = retriever.retrieve(QUESTION, &root).await.unwrap_err();
        assert!(matches!(err, CanopyError::Oracle(_)));
    }
}
