/// Section generator: writes one section from its source chunks, steered by
/// an optional exemplar.
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::completion::retry::RetryPolicy;
use crate::completion::{CallKind, CompletionRequest, CompletionService, Message};
use crate::config::PipelineConfig;
use crate::document::Document;
use crate::error::ServiceError;
use crate::section::SectionLabel;

const SYSTEM_PROMPT: &str = "You are a document summarization assistant.";
const SOURCE_SEPARATOR: &str = "\n\n";

pub struct SectionGenerator {
    service: Arc<dyn CompletionService>,
    instructions: BTreeMap<SectionLabel, String>,
    concurrency: usize,
    retry: RetryPolicy,
}

/// Generated sections plus the labels that could not be generated.
#[derive(Debug, Default)]
pub struct GeneratedSections {
    pub document: Document,
    pub failures: BTreeMap<SectionLabel, String>,
}

impl SectionGenerator {
    pub fn new(service: Arc<dyn CompletionService>, config: &PipelineConfig) -> Self {
        let instructions = SectionLabel::ALL
            .iter()
            .map(|&l| (l, config.instructions_for(l).to_string()))
            .collect();
        Self {
            service,
            instructions,
            concurrency: config.concurrency.max(1),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the generation prompt.
    #[must_use]
    pub fn prompt(&self, label: SectionLabel, chunks: &[String], exemplar: Option<&str>) -> String {
        let mut prompt = String::new();
        if let Some(instructions) = self.instructions.get(&label) {
            prompt.push_str(instructions);
            prompt.push_str("\n\n");
        }
        if let Some(example) = exemplar.map(str::trim).filter(|e| !e.is_empty()) {
            prompt.push_str("Here's an example of what the section should look like:\n");
            prompt.push_str(example);
            prompt.push_str("\n\nWrite the new section in the same style and structure.\n\n");
        }
        prompt.push_str(
            "Use only the source material below for facts; do not add information \
             that is not present in it.\n\nSource chunks:\n",
        );
        prompt.push_str(&chunks.join(SOURCE_SEPARATOR));
        prompt
    }

    /// Generate one section. Empty replies count as transient failures and
    /// are retried.
    pub async fn generate(
        &self,
        label: SectionLabel,
        chunks: &[String],
        exemplar: Option<&str>,
    ) -> Result<String, ServiceError> {
        let request = CompletionRequest {
            kind: CallKind::Generate,
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(self.prompt(label, chunks, exemplar)),
            ],
            temperature: 0.7,
            max_tokens: 1000,
        };
        let what = format!("{label} section generation");
        self.retry
            .run(&what, || async {
                let text = self.service.complete(&request).await?;
                let text = text.trim();
                if text.is_empty() {
                    Err(ServiceError::EmptyCompletion)
                } else {
                    Ok(text.to_string())
                }
            })
            .await
    }

    /// Generate every bucketed section. A section that fails is recorded and
    /// left out of the document; the others still complete.
    pub async fn generate_all(
        &self,
        buckets: &BTreeMap<SectionLabel, Vec<String>>,
        reference: Option<&Document>,
    ) -> GeneratedSections {
        let results: Vec<_> = stream::iter(buckets.iter().map(|(&label, chunks)| async move {
            let exemplar = reference.and_then(|r| r.get(label));
            (label, self.generate(label, chunks, exemplar).await)
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut out = GeneratedSections::default();
        for (label, result) in results {
            match result {
                Ok(text) => {
                    info!("Generated {label} section ({} chars)", text.len());
                    out.document.sections.insert(label, text);
                }
                Err(e) => {
                    warn!("Failed to generate {label} section: {e}");
                    out.failures.insert(label, e.to_string());
                }
            }
        }
        out
    }
}
