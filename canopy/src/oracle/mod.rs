//! The external relevance/summarization capability consumed by the index
//! builder and the retrieval traversal. The core never implements this
//! itself; production callers inject [`llm::LlmOracle`], tests inject stubs.

pub mod llm;
pub mod prompts;

use async_trait::async_trait;

use crate::error::{CanopyError, Result};

/// Context for one relevance-scoring call.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    /// Optional persona the scorer should adopt.
    pub persona: Option<&'a str>,
    /// The question sources are being scored against.
    pub question: &'a str,
    /// The candidate text (a leaf body or a child summary).
    pub text: &'a str,
}

/// Scoring and summarization capability. Both calls may be slow, remote and
/// fallible; retry policy belongs to the implementation, never to the core.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Probability in [0, 1] that `ctx.text` is relevant to `ctx.question`.
    async fn score(&self, ctx: &ScoreContext<'_>) -> Result<f64>;

    /// Short reference summary of `text`, bounded in length.
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Reject scores outside [0, 1] as a malformed oracle payload.
pub fn validate_score(score: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&score) || score.is_nan() {
        return Err(CanopyError::Oracle(format!(
            "relevance score {score} outside [0, 1]"
        )));
    }
    Ok(score)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_score_accepts_bounds() {
        assert_eq!(validate_score(0.0).unwrap(), 0.0);
        assert_eq!(validate_score(1.0).unwrap(), 1.0);
        assert_eq!(validate_score(0.37).unwrap(), 0.37);
    }

    #[test]
    fn test_validate_score_rejects_out_of_range() {
        assert!(validate_score(-0.01).is_err());
        assert!(validate_score(1.01).is_err());
        assert!(validate_score(f64::NAN).is_err());
    }
}
