/// Content classifier: routes each chunk to a section label with one
/// closed-option completion request.
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::completion::retry::RetryPolicy;
use crate::completion::{CallKind, CompletionRequest, CompletionService, Message};
use crate::content::ContentChunk;
use crate::error::ServiceError;
use crate::section::{LabelParse, SectionLabel};

const SYSTEM_PROMPT: &str = "You are a document classification assistant.";

pub struct Classifier {
    service: Arc<dyn CompletionService>,
    prefix_chars: usize,
    concurrency: usize,
    retry: RetryPolicy,
}

impl Classifier {
    pub fn new(
        service: Arc<dyn CompletionService>,
        prefix_chars: usize,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            service,
            prefix_chars: prefix_chars.max(1),
            concurrency: concurrency.max(1),
            retry,
        }
    }

    /// Build the classification prompt for `text`.
    #[must_use]
    pub fn prompt(&self, text: &str) -> String {
        let options: String = SectionLabel::ALL
            .iter()
            .map(|l| format!("- {} ({})\n", l.name(), l.hint()))
            .collect();
        format!(
            "Which section does the following text belong to? Options are:\n\
             {options}\n\
             Text: {}\n\n\
             Return only the section name, nothing else.",
            truncate_chars(text, self.prefix_chars)
        )
    }

    fn request(&self, text: &str) -> CompletionRequest {
        CompletionRequest {
            kind: CallKind::Classify,
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(self.prompt(text))],
            temperature: 0.0,
            max_tokens: 10,
        }
    }

    /// Classify one chunk of text.
    pub async fn classify(&self, text: &str) -> Result<LabelParse, ServiceError> {
        let request = self.request(text);
        let reply = self
            .retry
            .run("classification", || self.service.complete(&request))
            .await?;
        let parsed = SectionLabel::parse_reply(&reply);
        debug!("Classified chunk as {parsed:?}");
        Ok(parsed)
    }

    /// Classify every chunk, keeping at most `concurrency` requests in
    /// flight. Results come back in chunk order.
    pub async fn classify_all(
        &self,
        chunks: &[ContentChunk],
    ) -> Vec<Result<LabelParse, ServiceError>> {
        stream::iter(chunks.iter().map(|c| self.classify(&c.text)))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// First `max` characters of `text`, marked with an ellipsis when cut.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::mock::ScriptedCompletion;
    use crate::content::ChunkRole;

    fn classifier(mock: Arc<ScriptedCompletion>, prefix: usize) -> Classifier {
        Classifier::new(mock, prefix, 2, RetryPolicy::immediate(3))
    }

    fn chunk(text: &str) -> ContentChunk {
        ContentChunk {
            text: text.to_string(),
            role: ChunkRole::Paragraph,
            offset: 0,
            confidence: None,
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        // multi-byte characters are never split
        assert_eq!(truncate_chars("ééé", 2), "éé...");
    }

    #[test]
    fn test_prompt_lists_every_option() {
        let mock = Arc::new(ScriptedCompletion::by_kind("Other", "", ""));
        let prompt = classifier(mock, 500).prompt("Harbor dredging");
        for label in SectionLabel::ALL {
            assert!(prompt.contains(&format!("- {} ({})", label.name(), label.hint())));
        }
        assert!(prompt.contains("Text: Harbor dredging"));
        assert!(prompt.ends_with("Return only the section name, nothing else."));
    }

    #[tokio::test]
    async fn test_classify_is_deterministic_request() {
        let mock = Arc::new(ScriptedCompletion::by_kind(" fire \n", "", ""));
        let c = classifier(mock.clone(), 5);
        let label = c.classify("Wildfire suppression funding").await.unwrap();
        assert_eq!(label, LabelParse::Recognized(SectionLabel::Fire));

        let request = &mock.requests()[0];
        assert_eq!(request.kind, CallKind::Classify);
        assert_eq!(request.temperature, 0.0);
        assert!(request.prompt().contains("Text: Wildf..."));
        assert!(!request.prompt().contains("suppression"));
    }

    #[tokio::test]
    async fn test_unrecognized_reply_is_reported() {
        let mock = Arc::new(ScriptedCompletion::by_kind("Transportation", "", ""));
        let label = classifier(mock, 500).classify("Highways").await.unwrap();
        assert_eq!(label, LabelParse::Unrecognized("Transportation".into()));
    }

    #[tokio::test]
    async fn test_classify_all_keeps_order_and_isolates_failures() {
        let mock = Arc::new(ScriptedCompletion::new(|req| {
            let p = req.prompt();
            if p.contains("flood") {
                Ok("Water".into())
            } else if p.contains("broken") {
                Err(ServiceError::Status {
                    status: 400,
                    body: "content filtered".into(),
                })
            } else {
                Ok("Administrative".into())
            }
        }));
        let chunks = [chunk("flood barriers"), chunk("broken"), chunk("staffing")];
        let results = classifier(mock, 500).classify_all(&chunks).await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0].as_ref().unwrap(),
            &LabelParse::Recognized(SectionLabel::Water)
        );
        assert!(results[1].is_err());
        assert_eq!(
            results[2].as_ref().unwrap(),
            &LabelParse::Recognized(SectionLabel::Administrative)
        );
    }
}
