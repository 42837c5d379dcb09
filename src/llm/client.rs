use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{LedgerError, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// The opaque chat endpoint the orchestrator talks to. Abstracted so tests
/// can substitute a scripted endpoint.
pub trait ChatEndpoint {
    fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        response_schema: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// JSON-mode chat client for a Gemini-style generateContent endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ChatClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds a client from `LLM_API_KEY`, `LLM_MODEL` and `LLM_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY").map_err(|_| {
            LedgerError::Validation("LLM_API_KEY is not set".to_string())
        })?;
        let mut client = Self::new(api_key);
        if let Ok(model) = std::env::var("LLM_MODEL") {
            client = client.with_model(model);
        }
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            client = client.with_base_url(base_url);
        }
        Ok(client)
    }
}

impl ChatEndpoint for ChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_content: &str,
        response_schema: serde_json::Value,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": user_content }] }],
            "system_instruction": { "role": "user", "parts": [{ "text": system_prompt }] },
            "generationConfig": GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema,
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| LedgerError::Io(std::io::Error::other(err)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Io(std::io::Error::other(format!(
                "chat endpoint returned {}: {}",
                status, body
            ))));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| LedgerError::Io(std::io::Error::other(err)))?;

        let candidate = body
            .candidates
            .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
            .ok_or_else(|| {
                LedgerError::Io(std::io::Error::other("chat endpoint returned no candidates"))
            })?;

        if let Some(reason) = &candidate.finish_reason {
            if reason != "STOP" {
                warn!("chat endpoint finish reason: {}", reason);
            }
            if reason == "SAFETY" || reason == "MAX_TOKENS" {
                return Err(LedgerError::Io(std::io::Error::other(format!(
                    "generation stopped: {}",
                    reason
                ))));
            }
        }

        candidate
            .content
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| {
                LedgerError::Io(std::io::Error::other("chat endpoint returned no text part"))
            })
    }
}
