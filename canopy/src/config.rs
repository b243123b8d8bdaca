use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub index: IndexConfig,
    pub oracle: Option<OracleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the persisted node files.
    pub directory: String,
}

/// Configuration for the LLM-backed oracle adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Token cap for section summaries. Callers building an index typically
    /// override this with `chunk_length / max_subtopics`.
    pub summary_max_tokens: u32,
    /// Persona prefix used when scoring relevance.
    pub persona: Option<String>,
}

impl Config {
    /// Load configuration from `CANOPY_*` environment variables. An oracle
    /// section is only present when `CANOPY_LLM_MODEL` is set.
    pub fn from_env() -> Self {
        let oracle = env::var("CANOPY_LLM_MODEL").ok().map(|model| OracleConfig {
            model,
            api_key: parse_env_opt("CANOPY_LLM_API_KEY"),
            base_url: parse_env_opt("CANOPY_LLM_BASE_URL"),
            timeout_secs: parse_env_or("CANOPY_LLM_TIMEOUT_SECS", 60),
            max_retries: parse_env_or("CANOPY_LLM_MAX_RETRIES", 2),
            summary_max_tokens: parse_env_or("CANOPY_SUMMARY_MAX_TOKENS", 400),
            persona: parse_env_opt("CANOPY_PERSONA"),
        });

        Self {
            index: IndexConfig {
                directory: parse_env_or("CANOPY_INDEX_DIR", "data".to_string()),
            },
            oracle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_or_falls_back_on_missing() {
        let value: u64 = parse_env_or("CANOPY_TEST_UNSET_VAR", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_opt_missing_is_none() {
        let value: Option<String> = parse_env_opt("CANOPY_TEST_UNSET_VAR");
        assert!(value.is_none());
    }
}
