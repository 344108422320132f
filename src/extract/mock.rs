/// Static extraction service for testing purposes.
use async_trait::async_trait;

use super::{AnalyzeResult, ExtractionService};
use crate::error::ServiceError;

/// Returns the same analysis for every document, or fails every call.
pub struct StaticExtraction {
    result: Option<AnalyzeResult>,
}

impl StaticExtraction {
    #[must_use]
    pub fn new(result: AnalyzeResult) -> Self {
        Self {
            result: Some(result),
        }
    }

    /// An extractor whose every call fails with a transport error.
    #[must_use]
    pub fn failing() -> Self {
        Self { result: None }
    }
}

#[async_trait]
impl ExtractionService for StaticExtraction {
    async fn analyze(&self, _document: &[u8]) -> Result<AnalyzeResult, ServiceError> {
        self.result
            .clone()
            .ok_or_else(|| ServiceError::Transport("extraction service unavailable".into()))
    }
}
