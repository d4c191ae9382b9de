use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortens a task description before it is stored.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Runs `summarizer`, returning `text` verbatim if it fails or answers empty.
pub async fn summarize_or_original(summarizer: &dyn Summarizer, text: &str) -> String {
    match summarizer.summarize(text).await {
        Ok(summary) if !summary.trim().is_empty() => summary,
        Ok(_) => {
            warn!("summarizer returned an empty answer; keeping original description");
            text.to_string()
        }
        Err(err) => {
            warn!(error = %err, "summarizer failed; keeping original description");
            text.to_string()
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughSummarizer;

#[async_trait]
impl Summarizer for PassthroughSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Asks the Gemini `generateContent` endpoint to refine a description.
pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiSummarizer {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

fn prompt_for(text: &str) -> String {
    format!("Summarize and refine this task description for a notification: {text}")
}

fn first_text(response: GenerateResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text.trim().to_string())
        .ok_or_else(|| anyhow!("response carried no candidate text"))
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt_for(text) }] }]
        });
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("sending summarize request")?
            .error_for_status()
            .context("summarize request rejected")?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .context("decoding summarize response")?;
        first_text(parsed)
    }
}
