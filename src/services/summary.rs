use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::services::vision::Credential;

/// Errors that can occur when asking a language model for a summary
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("HTTP request failed: {0}")]
    RequestError(String),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SummaryError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestError(err.without_url().to_string())
    }
}

const SYSTEM_PROMPT: &str = "Your job is to provide a short, concise and informative summary about the landmark.";

/// Anything that can describe a landmark in a few sentences
#[async_trait]
pub trait LandmarkSummarizer: Send + Sync {
    async fn summarize(&self, landmark: &str, location: Option<&str>) -> Result<String, SummaryError>;

    fn name(&self) -> &'static str;
}

/// Model and limits for [`ChatSummaryClient`]
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            model: "gpt-3.5-turbo-0125".to_string(),
            temperature: 0.2,
            max_tokens: 150,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints
pub struct ChatSummaryClient {
    base_url: String,
    credential: Credential,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl ChatSummaryClient {
    pub fn new(credential: Credential, options: SummaryOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            base_url: options.endpoint.trim_end_matches('/').to_string(),
            credential,
            model: options.model,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            client,
        })
    }
}

/// User prompt for one landmark
pub fn prompt_for(landmark: &str, location: Option<&str>) -> String {
    match location {
        Some(location) => format!("Tell me about {} in {}.", landmark, location),
        None => format!("Tell me about {}.", landmark),
    }
}

#[async_trait]
impl LandmarkSummarizer for ChatSummaryClient {
    async fn summarize(&self, landmark: &str, location: Option<&str>) -> Result<String, SummaryError> {
        let prompt = prompt_for(landmark, location);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SummaryError::ApiError(format!(
                "Chat completion failed: {}",
                response.status()
            )));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::InvalidResponse(e.without_url().to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| SummaryError::InvalidResponse("No completion content".into()))
    }

    fn name(&self) -> &'static str {
        "chat-completions"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Summarizer that returns canned text without calling any model
#[derive(Debug, Clone)]
pub struct StaticSummarizer {
    text: String,
}

impl StaticSummarizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn demo() -> Self {
        Self::new(
            "The Maiden Tower is a 12th-century monument in the Old City, Baku, Azerbaijan. \
             Together with the Shirvanshahs' Palace it was listed in 2001 as a UNESCO World \
             Heritage Site, and it is one of the most prominent national symbols of Azerbaijan.",
        )
    }
}

#[async_trait]
impl LandmarkSummarizer for StaticSummarizer {
    async fn summarize(&self, _landmark: &str, _location: Option<&str>) -> Result<String, SummaryError> {
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
