//! Document layout extraction.
//!
//! The layout service is a black box; this module only models the parts of
//! its `analyzeResult` payload the pipeline reads, and the trait the
//! pipeline calls through.
pub mod azure;
pub mod mock;
pub mod saved;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::Span;
use crate::error::ServiceError;

/// Subset of the layout service's analysis result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub content: String,
    /// Semantic role such as `title`, `sectionHeading` or `pageFooter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Paragraph {
    /// Page furniture repeated on every page rather than document content.
    #[must_use]
    pub fn is_page_furniture(&self) -> bool {
        matches!(
            self.role.as_deref(),
            Some("pageHeader" | "pageFooter" | "pageNumber")
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub content: String,
}

/// A service that turns raw document bytes into an [`AnalyzeResult`].
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn analyze(&self, document: &[u8]) -> Result<AnalyzeResult, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_service_payload() {
        let json = r#"{
            "apiVersion": "2024-11-30",
            "content": "SEC. 1. Short title.",
            "pages": [{"pageNumber": 1, "width": 8.5}],
            "paragraphs": [
                {"content": "SEC. 1. Short title.", "role": "sectionHeading",
                 "spans": [{"offset": 0, "length": 20}],
                 "boundingRegions": []}
            ],
            "tables": [
                {"rowCount": 2, "columnCount": 1,
                 "cells": [{"kind": "columnHeader", "rowIndex": 0, "columnIndex": 0, "content": "Name"}],
                 "spans": [{"offset": 21, "length": 10}]}
            ]
        }"#;
        let result: AnalyzeResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.paragraphs[0].role.as_deref(), Some("sectionHeading"));
        assert_eq!(result.paragraphs[0].spans[0].length, 20);
        assert!(result.paragraphs[0].confidence.is_none());
        assert_eq!(result.tables[0].row_count, 2);
        assert_eq!(result.tables[0].cells[0].content, "Name");
    }

    #[test]
    fn test_page_furniture() {
        let mut p = Paragraph {
            content: "3".into(),
            role: Some("pageNumber".into()),
            spans: vec![],
            confidence: None,
        };
        assert!(p.is_page_furniture());
        p.role = Some("title".into());
        assert!(!p.is_page_furniture());
        p.role = None;
        assert!(!p.is_page_furniture());
    }
}
