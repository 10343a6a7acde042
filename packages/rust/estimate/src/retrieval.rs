//! Reference passages for the estimate prompt.
//!
//! Similarity search lives outside this crate; the estimate flow only needs
//! "given a query, return some passages".

use async_trait::async_trait;
use welfarebridge_shared::Result;

#[async_trait]
pub trait ReferenceRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>>;
}

/// Supplies no references; the prompt carries the profile alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

#[async_trait]
impl ReferenceRetriever for NoReferences {
    async fn retrieve(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Returns the same fixed passages for every query.
#[derive(Debug, Clone, Default)]
pub struct StaticReferences {
    passages: Vec<String>,
}

impl StaticReferences {
    pub fn new(passages: Vec<String>) -> Self {
        Self { passages }
    }
}

#[async_trait]
impl ReferenceRetriever for StaticReferences {
    async fn retrieve(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.passages.clone())
    }
}
