//! Content chunking: turns an extraction result into an ordered list of
//! classifiable chunks.
//!
//! Paragraphs that overlap a table region are dropped in favour of the
//! table's flattened records. Chunks are ordered by the offset of their
//! first span, which is reading order for the layout service.
pub mod spans;
pub mod table;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use spans::Span;
pub use table::TableRecord;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::extract::AnalyzeResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    Paragraph,
    Table,
}

/// A unit of classifiable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    pub text: String,
    pub role: ChunkRole,
    /// Start of the chunk's first span.
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Filters applied while building chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkOptions {
    pub skip_page_furniture: bool,
    /// Drop chunks whose reported confidence is below this value.
    pub min_confidence: Option<f32>,
}

impl From<&PipelineConfig> for ChunkOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            skip_page_furniture: config.skip_page_furniture,
            min_confidence: config
                .confidence_filter
                .enabled
                .then_some(config.confidence_filter.min_confidence),
        }
    }
}

impl ChunkOptions {
    /// Chunks without a confidence value always pass.
    fn passes_confidence(&self, confidence: Option<f32>) -> bool {
        match (self.min_confidence, confidence) {
            (Some(min), Some(c)) => c >= min,
            _ => true,
        }
    }
}

/// Build the ordered chunk list for one analyzed document.
///
/// Fails when a paragraph or a non-empty table carries no span, since the
/// table-overlap test cannot be evaluated without one.
pub fn build_chunks(
    result: &AnalyzeResult,
    options: ChunkOptions,
) -> Result<Vec<ContentChunk>, PipelineError> {
    let content_tables: Vec<_> = result
        .tables
        .iter()
        .enumerate()
        .filter(|(_, t)| table::has_content(t))
        .collect();

    let mut table_spans = Vec::new();
    for (i, t) in &content_tables {
        if t.spans.is_empty() {
            return Err(PipelineError::MalformedExtraction(format!(
                "table {i} has cells but no spans"
            )));
        }
        table_spans.extend(t.spans.iter().copied());
    }

    let mut chunks = Vec::new();
    let mut absorbed = 0usize;
    let mut skipped = 0usize;

    for (i, paragraph) in result.paragraphs.iter().enumerate() {
        let span = paragraph.spans.first().ok_or_else(|| {
            PipelineError::MalformedExtraction(format!("paragraph {i} has no spans"))
        })?;

        if spans::in_any_table(span, &table_spans) {
            absorbed += 1;
            continue;
        }
        if (options.skip_page_furniture && paragraph.is_page_furniture())
            || !options.passes_confidence(paragraph.confidence)
            || paragraph.content.trim().is_empty()
        {
            skipped += 1;
            continue;
        }

        chunks.push(ContentChunk {
            text: paragraph.content.clone(),
            role: ChunkRole::Paragraph,
            offset: span.offset,
            confidence: paragraph.confidence,
        });
    }

    for (i, t) in content_tables {
        let records = table::flatten(t);
        if records.iter().all(TableRecord::is_empty) {
            debug!("Table {i} flattened to no records, skipping");
            continue;
        }
        chunks.push(ContentChunk {
            text: table::records_to_text(&records),
            role: ChunkRole::Table,
            offset: t.spans.iter().map(|s| s.offset).min().unwrap_or_default(),
            confidence: None,
        });
    }

    // Stable sort keeps service order for chunks sharing an offset.
    chunks.sort_by_key(|c| c.offset);

    debug!(
        "Built {} chunks ({absorbed} paragraphs inside tables, {skipped} filtered)",
        chunks.len()
    );
    Ok(chunks)
}
