/// Offline extraction from a previously saved analysis.
///
/// Accepts the bare `analyzeResult` object that `billsift analyze` writes,
/// an `{"analyzeResult": ...}` wrapper, or a full operation response saved
/// from the service.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::azure::{OperationStatus, finished};
use super::{AnalyzeResult, ExtractionService};
use crate::error::ServiceError;

pub struct SavedAnalysis {
    path: PathBuf,
}

impl SavedAnalysis {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(path: &Path) -> Result<AnalyzeResult, ServiceError> {
        let data = std::fs::read_to_string(path)?;
        parse(&data)
    }
}

/// Parse saved analysis JSON in either accepted shape.
pub fn parse(data: &str) -> Result<AnalyzeResult, ServiceError> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| ServiceError::Malformed(format!("saved analysis: {e}")))?;

    if value.get("status").is_some() {
        let op: OperationStatus = serde_json::from_value(value)
            .map_err(|e| ServiceError::Malformed(format!("saved operation: {e}")))?;
        return finished(op)?.ok_or_else(|| {
            ServiceError::AnalysisFailed("saved operation had not finished".into())
        });
    }

    let inner = value.get("analyzeResult").cloned().unwrap_or(value);
    serde_json::from_value(inner)
        .map_err(|e| ServiceError::Malformed(format!("saved analysis: {e}")))
}

#[async_trait]
impl ExtractionService for SavedAnalysis {
    /// The document bytes are ignored; the saved result stands in for them.
    async fn analyze(&self, _document: &[u8]) -> Result<AnalyzeResult, ServiceError> {
        Self::load(&self.path)
    }
}
