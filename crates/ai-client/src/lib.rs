//! HTTP client for a Gemini-style `generateContent` REST API: one
//! narrative report per symbol, plus the single joint-analysis call
//! over every completed report.

pub mod joint;
pub mod prompt;

pub use joint::{parse_joint_response, JointReport, JSON_DATA_END, JSON_DATA_START};

use std::sync::Arc;
use std::time::Duration;

use analysis_core::{
    AnalysisError, AnalysisKind, HistoryRange, JointEntry, MarketDataProvider, NarrativeProvider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    market_data: Arc<dyn MarketDataProvider>,
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        model: String,
        market_data: Arc<dyn MarketDataProvider>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key,
            model,
            base_url: BASE_URL.to_string(),
            market_data,
        }
    }

    /// Point the client at a different endpoint (stub server in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Issue one text-generation call and extract the candidate text.
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AnalysisError::RateLimited(
                "Generation API throttled the request".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AnalysisError::Upstream(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                AnalysisError::InvalidResponse("Response carried no candidate text".to_string())
            })
    }
}

#[async_trait]
impl NarrativeProvider for GeminiClient {
    async fn request_narrative(
        &self,
        symbol: &str,
        kind: AnalysisKind,
    ) -> Result<String, AnalysisError> {
        // Two years of history gives the model enough trend context.
        let series = self
            .market_data
            .fetch_price_series(symbol, HistoryRange::TwoYears)
            .await?;

        tracing::info!("Requesting {} analysis for {}", kind.as_str(), symbol);
        let report = self
            .generate(&prompt::narrative_prompt(symbol, kind, &series))
            .await?;
        tracing::debug!("Received {} chars of analysis for {}", report.len(), symbol);
        Ok(report)
    }

    async fn request_joint(&self, entries: &[JointEntry]) -> Result<String, AnalysisError> {
        if entries.is_empty() {
            return Err(AnalysisError::Config(
                "Joint analysis needs at least one completed report".to_string(),
            ));
        }

        tracing::info!("Requesting joint analysis over {} reports", entries.len());
        self.generate(&prompt::joint_prompt(entries)).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}
