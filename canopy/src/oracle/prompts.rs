//! Prompt templates for the LLM-backed oracle.
//!
//! Plain `format!()` interpolation keeps the variables type-checked at
//! compile time.

/// Prompt for indexing a section of a document with a concise reference
/// summary. The model is told not to assume the text is complete, and to
/// describe what is included rather than repeat it.
pub fn summary_prompt() -> &'static str {
    "You are an expert at organizing text. You are indexing a section of a \
     document to enable researchers to identify the most relevant sections \
     of the document to reference for future questions. Do not assume that \
     the text is complete, and focus on identifying what is included rather \
     than repeating the details of the text. Provide no preamble or \
     explanation, only a concise reference text."
}

const DEFAULT_PERSONA: &str = "a careful research assistant";

/// Prompt asking for a relevance probability as JSON:
/// `{"relevance": <probability between 0 and 1>}`.
pub fn relevance_prompt(persona: Option<&str>, question: &str, text: &str) -> String {
    let persona = persona.unwrap_or(DEFAULT_PERSONA);
    format!(
        r#"You are {persona}, with perfectly calibrated predictive accuracy.
Give a probability estimate that the following information source will
contain information that is directly relevant to the given query.
Provide the response as a JSON object with a single key, "relevance", and
value the probability that the source will be useful, between 0 and 1.

Query to find sources for: {question}

-------

Source: {text}"#
    )
}
