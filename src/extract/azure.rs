/// Azure Document Intelligence layout client.
///
/// Submits the document as base64, then polls the returned
/// `Operation-Location` until the analysis finishes or the poll deadline
/// passes.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AnalyzeResult, ExtractionService};
use crate::config::ExtractionConfig;
use crate::error::ServiceError;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Clone)]
pub struct AzureLayoutClient {
    http_client: reqwest::Client,
    analyze_url: String,
    api_key: String,
    timeout: Duration,
    poll_interval: Duration,
    poll_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    base64_source: String,
}

/// Body of an operation poll, also the shape of a saved analysis dump.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OperationStatus {
    pub status: String,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl AzureLayoutClient {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ServiceError> {
        let endpoint = config.resolve_endpoint()?;
        let api_key = config.resolve_api_key()?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("billsift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Transport(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            http_client,
            analyze_url: analyze_url(&endpoint, &config.model_id, &config.api_version),
            api_key,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            poll_timeout: config.poll_timeout(),
        })
    }

    async fn submit(&self, document: &[u8]) -> Result<String, ServiceError> {
        let body = AnalyzeRequest {
            base64_source: base64::engine::general_purpose::STANDARD.encode(document),
        };

        let response = self
            .http_client
            .post(&self.analyze_url)
            .header(KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Malformed("missing Operation-Location header".into()))
    }

    async fn poll(&self, operation_url: &str) -> Result<AnalyzeResult, ServiceError> {
        let started = Instant::now();
        loop {
            let response = self
                .http_client
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ServiceError::from_reqwest(e, self.timeout))?;
            if !status.is_success() {
                return Err(ServiceError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let op: OperationStatus = serde_json::from_str(&text)
                .map_err(|e| ServiceError::Malformed(format!("operation status: {e}")))?;

            if let Some(result) = finished(op)? {
                return Ok(result);
            }

            if started.elapsed() >= self.poll_timeout {
                return Err(ServiceError::Timeout(self.poll_timeout));
            }
            debug!("Analysis still running, polling again in {:?}", self.poll_interval);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn analyze_url(endpoint: &str, model_id: &str, api_version: &str) -> String {
    format!(
        "{}/documentintelligence/documentModels/{model_id}:analyze?api-version={api_version}",
        endpoint.trim_end_matches('/')
    )
}

/// `Ok(None)` while the operation is still running.
pub(crate) fn finished(op: OperationStatus) -> Result<Option<AnalyzeResult>, ServiceError> {
    match op.status.as_str() {
        "succeeded" => op
            .analyze_result
            .map(Some)
            .ok_or_else(|| ServiceError::Malformed("succeeded without analyzeResult".into())),
        "failed" | "canceled" => {
            let detail = op
                .error
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| op.status.clone());
            Err(ServiceError::AnalysisFailed(detail))
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl ExtractionService for AzureLayoutClient {
    async fn analyze(&self, document: &[u8]) -> Result<AnalyzeResult, ServiceError> {
        info!("Submitting {} bytes for layout analysis", document.len());
        let operation_url = self.submit(document).await?;
        let result = self.poll(&operation_url).await?;
        info!(
            "Layout analysis finished: {} pages, {} paragraphs, {} tables",
            result.pages.len(),
            result.paragraphs.len(),
            result.tables.len()
        );
        Ok(result)
    }
}
