use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SummaryProvider, MAX_SUMMARY_WORDS};

/// generateContent endpoint of the flash model.
pub const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Summarizer backed by the Google Generative Language HTTP API.
pub struct GeminiClient {
    api_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: GEMINI_API_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Points the client at a different endpoint, mainly for tests against a
    /// local mock server.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }
}

#[async_trait::async_trait]
impl SummaryProvider for GeminiClient {
    async fn summarize(&self, content: &str) -> Result<String> {
        let prompt = format!(
            "Tóm tắt nội dung sau thành tối đa {max} từ bằng tiếng Việt. \
             Nếu vượt quá {max} từ, yêu cầu tóm tắt lại tiếp:\n\n{content}",
            max = MAX_SUMMARY_WORDS,
            content = content
        );

        let req_body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "text/plain".to_string(),
            },
        };

        // Make HTTP request with timeout
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&self.api_url)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(&req_body)
                .send(),
        )
        .await
        .context("Gemini request timed out")?
        .context("Gemini HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {}: {}", status, body);
        }

        let resp_body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = resp_body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .context("Gemini response has no candidates")?;

        Ok(text)
    }
}

// Generative Language API request/response structures
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    response_mime_type: String,
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
    parts: Vec<Part>,
}
