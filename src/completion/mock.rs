/// Scripted completion service for testing purposes.
///
/// Replies are produced by a caller-supplied function of the request, and
/// every request is recorded so tests can assert on prompts and call counts.
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CallKind, CompletionRequest, CompletionService};
use crate::error::ServiceError;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, ServiceError> + Send + Sync>;

pub struct ScriptedCompletion {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with a fixed string per call kind.
    #[must_use]
    pub fn by_kind(classify: &str, generate: &str, evaluate: &str) -> Self {
        let (c, g, e) = (
            classify.to_string(),
            generate.to_string(),
            evaluate.to_string(),
        );
        Self::new(move |req| {
            Ok(match req.kind {
                CallKind::Classify => c.clone(),
                CallKind::Generate => g.clone(),
                CallKind::Evaluate => e.clone(),
            })
        })
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        self.requests().iter().filter(|r| r.kind == kind).count()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        (self.responder)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Message;

    fn request(kind: CallKind) -> CompletionRequest {
        CompletionRequest {
            kind,
            messages: vec![Message::user("prompt")],
            temperature: 0.0,
            max_tokens: 10,
        }
    }

    #[tokio::test]
    async fn test_by_kind_dispatch() {
        let mock = ScriptedCompletion::by_kind("Fire", "summary", "8");
        assert_eq!(mock.complete(&request(CallKind::Classify)).await.unwrap(), "Fire");
        assert_eq!(mock.complete(&request(CallKind::Generate)).await.unwrap(), "summary");
        assert_eq!(mock.complete(&request(CallKind::Evaluate)).await.unwrap(), "8");
        assert_eq!(mock.count(CallKind::Classify), 1);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_errors_are_passed_through() {
        let mock = ScriptedCompletion::new(|_| Err(ServiceError::EmptyCompletion));
        assert!(mock.complete(&request(CallKind::Generate)).await.is_err());
        assert_eq!(mock.requests()[0].prompt(), "prompt");
    }
}
