//! Scheme retrieval service clients
//!
//! The retriever answers free-text queries with ranked scheme hits. The
//! `HttpRetriever` talks to the external vector-search service; the
//! `KeywordRetriever` is the catalog-backed fallback used when no service is
//! configured. Retrieval failures are non-fatal to the turn: the executor
//! records them as tool failures and continues.

use crate::catalog::SchemeCatalog;
use async_trait::async_trait;
use sdk::scheme::RetrievalHit;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result type for retrieval operations
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur during scheme retrieval
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Retrieval service trait
#[async_trait]
pub trait SchemeRetriever: Send + Sync {
    /// Returns the name of the retriever (e.g., "http", "keyword")
    fn name(&self) -> &str;

    /// Search for schemes relevant to the query, best first.
    /// An empty result set is a valid answer, not an error.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>>;
}

/// Wire shape of the retrieval service response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<RetrievalHit>,
}

/// Client for the external retrieval service
pub struct HttpRetriever {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRetriever {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl SchemeRetriever for HttpRetriever {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": query, "top_k": top_k }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RetrievalError::Timeout
                } else {
                    RetrievalError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RetrievalError::InvalidResponse(format!(
                "status {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        debug!(query, hits = body.hits.len(), "Retrieval service responded");
        Ok(body.hits)
    }
}

/// Catalog-backed keyword search, used when no retrieval service is
/// configured.
///
/// Scores each scheme by the fraction of query terms found in its name,
/// description, or keywords. Deterministic: ties break by ascending scheme
/// id.
pub struct KeywordRetriever {
    catalog: Arc<SchemeCatalog>,
}

impl KeywordRetriever {
    pub fn new(catalog: Arc<SchemeCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl SchemeRetriever for KeywordRetriever {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|t| t.len() > 2)
            .collect();

        if terms.is_empty() {
            return Ok(vec![]);
        }

        let mut hits: Vec<RetrievalHit> = self
            .catalog
            .schemes()
            .iter()
            .filter_map(|scheme| {
                let haystack = format!(
                    "{} {} {}",
                    scheme.name.to_lowercase(),
                    scheme.description.to_lowercase(),
                    scheme.keywords.join(" ").to_lowercase()
                );
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                if matched == 0 {
                    None
                } else {
                    Some(RetrievalHit {
                        scheme_id: scheme.id.clone(),
                        relevance_score: matched as f64 / terms.len() as f64,
                    })
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.scheme_id.cmp(&b.scheme_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_retriever() -> KeywordRetriever {
        let catalog = SchemeCatalog::load(None).unwrap();
        KeywordRetriever::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn test_keyword_search_finds_housing_schemes() {
        let retriever = keyword_retriever();
        let hits = retriever.search("I want to build a house", 5).await.unwrap();

        assert!(!hits.is_empty());
        let ids: Vec<&str> = hits.iter().map(|h| h.scheme_id.as_str()).collect();
        assert!(ids.contains(&"pm_awas_gramin"));
    }

    #[tokio::test]
    async fn test_keyword_search_empty_for_unrelated_query() {
        let retriever = keyword_retriever();
        let hits = retriever.search("zzz qqq xyzzy", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_search_deterministic_and_bounded() {
        let retriever = keyword_retriever();
        let first = retriever.search("pension for workers", 2).await.unwrap();
        let second = retriever.search("pension for workers", 2).await.unwrap();

        assert_eq!(first, second);
        assert!(first.len() <= 2);
    }

    #[tokio::test]
    async fn test_short_terms_ignored() {
        let retriever = keyword_retriever();
        // All terms under the length threshold
        let hits = retriever.search("a an is", 5).await.unwrap();
        assert!(hits.is_empty());
    }
}
