/// End-to-end processing of one document.
///
/// extraction → chunking → classification → aggregation → generation.
/// Each stage finishes before the next starts; within classification and
/// generation, independent requests run concurrently.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregate::{AggregationStats, SectionAggregator};
use crate::classify::Classifier;
use crate::completion::CompletionService;
use crate::completion::retry::RetryPolicy;
use crate::config::PipelineConfig;
use crate::content::{self, ChunkOptions};
use crate::document::Document;
use crate::error::PipelineError;
use crate::evaluate::DocumentEvaluator;
use crate::extract::{AnalyzeResult, ExtractionService};
use crate::generate::SectionGenerator;
use crate::section::SectionLabel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub chunks: usize,
    /// Chunks whose classification request failed.
    pub unclassified: usize,
    pub aggregation: AggregationStats,
}

/// Result of one pipeline run. Sections listed in `failures` are absent
/// from `document`.
#[derive(Debug, Default)]
pub struct ProcessedDocument {
    pub document: Document,
    pub failures: BTreeMap<SectionLabel, String>,
    pub stats: RunStats,
}

pub struct DocumentProcessor {
    extractor: Arc<dyn ExtractionService>,
    classifier: Classifier,
    generator: SectionGenerator,
    evaluator: DocumentEvaluator,
    config: PipelineConfig,
}

impl DocumentProcessor {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        completion: Arc<dyn CompletionService>,
        config: PipelineConfig,
    ) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self::with_retry(extractor, completion, config, retry)
    }

    /// Like [`DocumentProcessor::new`] with an explicit retry policy.
    pub fn with_retry(
        extractor: Arc<dyn ExtractionService>,
        completion: Arc<dyn CompletionService>,
        config: PipelineConfig,
        retry: RetryPolicy,
    ) -> Self {
        let classifier = Classifier::new(
            completion.clone(),
            config.classify_prefix_chars,
            config.concurrency,
            retry,
        );
        let generator = SectionGenerator::new(completion.clone(), &config).with_retry(retry);
        let evaluator = DocumentEvaluator::new(completion, config.concurrency, retry);
        Self {
            extractor,
            classifier,
            generator,
            evaluator,
            config,
        }
    }

    #[must_use]
    pub fn evaluator(&self) -> &DocumentEvaluator {
        &self.evaluator
    }

    /// Read a PDF from disk and process it.
    pub async fn process_pdf(
        &self,
        path: &Path,
        reference: Option<&Document>,
    ) -> Result<ProcessedDocument, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        info!("Processing {} ({} bytes)", path.display(), bytes.len());
        self.process_bytes(&bytes, reference).await
    }

    pub async fn process_bytes(
        &self,
        document: &[u8],
        reference: Option<&Document>,
    ) -> Result<ProcessedDocument, PipelineError> {
        let analysis = self.extractor.analyze(document).await?;
        self.process_analysis(&analysis, reference).await
    }

    /// Run every stage after extraction.
    pub async fn process_analysis(
        &self,
        analysis: &AnalyzeResult,
        reference: Option<&Document>,
    ) -> Result<ProcessedDocument, PipelineError> {
        let chunks = content::build_chunks(analysis, ChunkOptions::from(&self.config))?;
        info!("Classifying {} chunks", chunks.len());

        let labels = self.classifier.classify_all(&chunks).await;

        let mut aggregator = SectionAggregator::new(self.config.unrecognized_label);
        let mut unclassified = 0usize;
        for (chunk, label) in chunks.iter().zip(&labels) {
            match label {
                Ok(label) => aggregator.push(chunk.text.as_str(), label),
                Err(e) => {
                    warn!("Skipping chunk at offset {}: classification failed: {e}", chunk.offset);
                    unclassified += 1;
                }
            }
        }
        let aggregation = aggregator.stats();
        let buckets = aggregator.into_buckets();
        info!(
            "Grouped chunks into {} sections: {:?}",
            buckets.len(),
            buckets.keys().collect::<Vec<_>>()
        );

        let generated = self.generator.generate_all(&buckets, reference).await;

        Ok(ProcessedDocument {
            document: generated.document,
            failures: generated.failures,
            stats: RunStats {
                chunks: chunks.len(),
                unclassified,
                aggregation,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::mock::ScriptedCompletion;
    use crate::completion::CallKind;
    use crate::config::UnrecognizedLabelPolicy;
    use crate::content::Span;
    use crate::error::ServiceError;
    use crate::extract::mock::StaticExtraction;
    use crate::extract::saved::SavedAnalysis;
    use crate::extract::Paragraph;

    fn analysis(texts: &[&str]) -> AnalyzeResult {
        let paragraphs = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Paragraph {
                content: (*t).to_string(),
                role: None,
                spans: vec![Span::new(i as u64 * 100, 50)],
                confidence: None,
            })
            .collect();
        AnalyzeResult {
            paragraphs,
            ..Default::default()
        }
    }

    fn processor(
        extractor: StaticExtraction,
        mock: Arc<ScriptedCompletion>,
        config: PipelineConfig,
    ) -> DocumentProcessor {
        DocumentProcessor::with_retry(Arc::new(extractor), mock, config, RetryPolicy::immediate(2))
    }

    #[tokio::test]
    async fn test_extraction_failure_aborts() {
        let mock = Arc::new(ScriptedCompletion::by_kind("Water", "x", "5"));
        let p = processor(StaticExtraction::failing(), mock.clone(), PipelineConfig::default());
        let err = p.process_bytes(b"%PDF", None).await.unwrap_err();
        assert!(err.is_external());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_classification_failure_is_local() {
        let mock = Arc::new(ScriptedCompletion::new(|req| match req.kind {
            CallKind::Classify if req.prompt().contains("unlucky") => Err(ServiceError::Status {
                status: 400,
                body: "filtered".into(),
            }),
            CallKind::Classify => Ok("Fire".into()),
            _ => Ok("Fire summary".into()),
        }));
        let p = processor(
            StaticExtraction::new(analysis(&["station", "unlucky"])),
            mock,
            PipelineConfig::default(),
        );
        let out = p.process_bytes(b"", None).await.unwrap();
        assert_eq!(out.stats.chunks, 2);
        assert_eq!(out.stats.unclassified, 1);
        assert_eq!(out.document.get(SectionLabel::Fire), Some("Fire summary"));
    }

    #[tokio::test]
    async fn test_drop_policy_discards_unrecognized() {
        let mock = Arc::new(ScriptedCompletion::by_kind("Transit", "summary", "5"));
        let config = PipelineConfig {
            unrecognized_label: UnrecognizedLabelPolicy::Drop,
            ..Default::default()
        };
        let p = processor(StaticExtraction::new(analysis(&["buses"])), mock.clone(), config);
        let out = p.process_bytes(b"", None).await.unwrap();
        assert!(out.document.is_empty());
        assert_eq!(out.stats.aggregation.dropped, 1);
        assert_eq!(mock.count(CallKind::Generate), 0);
    }

    #[tokio::test]
    async fn test_fallback_policy_files_under_other() {
        let mock = Arc::new(ScriptedCompletion::by_kind("Transit", "summary", "5"));
        let p = processor(
            StaticExtraction::new(analysis(&["buses"])),
            mock,
            PipelineConfig::default(),
        );
        let out = p.process_bytes(b"", None).await.unwrap();
        assert_eq!(out.document.labels(), vec![SectionLabel::Other]);
        assert_eq!(out.stats.aggregation.fallback, 1);
    }

    #[tokio::test]
    async fn test_process_pdf_reads_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bill.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let mock = Arc::new(ScriptedCompletion::by_kind("Water", "Flood works", "5"));
        let p = processor(
            StaticExtraction::new(analysis(&["levee repair"])),
            mock,
            PipelineConfig::default(),
        );
        let out = p.process_pdf(&path, None).await.unwrap();
        assert_eq!(out.document.get(SectionLabel::Water), Some("Flood works"));

        let missing = p.process_pdf(&temp.path().join("absent.pdf"), None).await;
        assert!(matches!(missing, Err(PipelineError::Io(_))));
    }

    #[tokio::test]
    async fn test_missing_saved_analysis_is_local() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(ScriptedCompletion::by_kind("Water", "x", "5"));
        let p = DocumentProcessor::with_retry(
            Arc::new(SavedAnalysis::new(temp.path().join("analysis.json"))),
            mock,
            PipelineConfig::default(),
            RetryPolicy::immediate(1),
        );
        let err = p.process_bytes(&[], None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
        assert!(!err.is_external());
    }
}
