/// Document evaluator: rates a generated document against a reference,
/// section by section.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::completion::retry::RetryPolicy;
use crate::completion::{CallKind, CompletionRequest, CompletionService, Message};
use crate::document::Document;
use crate::section::SectionLabel;

const MAX_SCORE: f32 = 10.0;

/// Score for one reference section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum SectionScore {
    Rated(f32),
    /// The generated document has no such section; counts as 0.
    Missing,
    /// Rating could not be obtained; excluded from the average.
    Failed(String),
}

impl SectionScore {
    /// Numeric value, or `None` when scoring failed.
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        match self {
            Self::Rated(v) => Some(*v),
            Self::Missing => Some(0.0),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub section_scores: BTreeMap<SectionLabel, SectionScore>,
    /// Mean over resolved sections; `None` when nothing could be scored.
    pub overall_score: Option<f32>,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationReport {
    #[must_use]
    pub fn from_scores(section_scores: BTreeMap<SectionLabel, SectionScore>) -> Self {
        let values: Vec<f32> = section_scores.values().filter_map(SectionScore::value).collect();
        let overall_score = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f32>() / values.len() as f32)
        };
        Self {
            section_scores,
            overall_score,
            evaluated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed_sections(&self) -> Vec<SectionLabel> {
        self.section_scores
            .iter()
            .filter(|(_, s)| matches!(s, SectionScore::Failed(_)))
            .map(|(l, _)| *l)
            .collect()
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.overall_score {
            Some(score) => writeln!(f, "Overall score: {score:.2}")?,
            None => writeln!(f, "Overall score: n/a")?,
        }
        writeln!(f, "\nSection scores:")?;
        for (label, score) in &self.section_scores {
            match score {
                SectionScore::Rated(v) => writeln!(f, "{label}: {v}")?,
                SectionScore::Missing => writeln!(f, "{label}: 0 (missing)")?,
                SectionScore::Failed(reason) => writeln!(f, "{label}: failed ({reason})")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreParseError {
    #[error("rating is not a number: {0:?}")]
    NotNumeric(String),
    #[error("rating {0} is outside 0..=10")]
    OutOfRange(String),
}

/// Parse a rating reply such as `7`, `7.5`, `8/10` or `6.`.
pub fn parse_score(reply: &str) -> Result<f32, ScoreParseError> {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*(?:/\s*10)?\s*\.?\s*$").expect("valid score pattern")
    });
    let caps = RE
        .captures(reply)
        .ok_or_else(|| ScoreParseError::NotNumeric(reply.trim().to_string()))?;
    let value: f32 = caps[1]
        .parse()
        .map_err(|_| ScoreParseError::NotNumeric(reply.trim().to_string()))?;
    if !(0.0..=MAX_SCORE).contains(&value) {
        return Err(ScoreParseError::OutOfRange(caps[1].to_string()));
    }
    Ok(value)
}

pub struct DocumentEvaluator {
    service: Arc<dyn CompletionService>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl DocumentEvaluator {
    pub fn new(service: Arc<dyn CompletionService>, concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
            retry,
        }
    }

    fn prompt(generated: &str, reference: &str) -> String {
        format!(
            "Compare these two sections and rate the generated section on a scale of 1 to 10.\n\
             Here's the example section:\n{reference}\n\n\
             Here's the generated section:\n{generated}\n\n\
             Return only the score, nothing else."
        )
    }

    async fn rate(&self, label: SectionLabel, generated: &str, reference: &str) -> SectionScore {
        let request = CompletionRequest {
            kind: CallKind::Evaluate,
            messages: vec![Message::user(Self::prompt(generated, reference))],
            temperature: 0.0,
            max_tokens: 10,
        };
        let what = format!("{label} section rating");
        let reply = match self.retry.run(&what, || self.service.complete(&request)).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not rate {label} section: {e}");
                return SectionScore::Failed(e.to_string());
            }
        };
        match parse_score(&reply) {
            Ok(v) => SectionScore::Rated(v),
            Err(e) => {
                warn!("Could not parse {label} rating: {e}");
                SectionScore::Failed(e.to_string())
            }
        }
    }

    /// Score every reference section. Sections the generated document adds
    /// beyond the reference are ignored.
    pub async fn compare(&self, generated: &Document, reference: &Document) -> EvaluationReport {
        let scores: BTreeMap<SectionLabel, SectionScore> =
            stream::iter(reference.sections.iter().map(|(&label, reference_text)| async move {
                let score = match generated.get(label) {
                    Some(text) => self.rate(label, text, reference_text).await,
                    None => SectionScore::Missing,
                };
                (label, score)
            }))
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = EvaluationReport::from_scores(scores);
        info!(
            "Evaluated {} sections, overall {:?}",
            report.section_scores.len(),
            report.overall_score
        );
        report
    }
}
