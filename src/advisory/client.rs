//! HTTP client for an OpenAI-compatible chat-completions endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::error::AdvisoryError;
use super::prompt::Prompt;
use super::Advisor;
use crate::config::AdvisorConfig;

/// Sampling temperature sent with every request
const SAMPLING_TEMPERATURE: f32 = 0.4;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Reasoning service reached over HTTP
///
/// One request per advisory, bounded by the client timeout. Without an API
/// key every call fails with `MissingCredential` before touching the network.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
        })
    }

    pub fn from_config(config: &AdvisorConfig) -> reqwest::Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.api_key.clone(),
            config.timeout(),
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn classify(&self, err: reqwest::Error) -> AdvisoryError {
        if err.is_timeout() {
            AdvisoryError::Timeout(self.timeout)
        } else if err.is_decode() {
            AdvisoryError::InvalidResponse(err.to_string())
        } else {
            AdvisoryError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Advisor for ChatCompletionsClient {
    #[instrument(skip_all, fields(mode = ?prompt.mode, max_tokens = prompt.max_tokens))]
    async fn advise(&self, prompt: &Prompt) -> Result<String, AdvisoryError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AdvisoryError::MissingCredential);
        };

        let request = ChatRequest {
            model: &self.model,
            messages: [
                RequestMessage {
                    role: "system",
                    content: &prompt.system,
                },
                RequestMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: prompt.max_tokens,
            temperature: SAMPLING_TEMPERATURE,
        };

        debug!("sending advisory request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("advisory service responded with {status}");
            return Err(AdvisoryError::status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| self.classify(e))?;

        parsed
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .find(|content| !content.is_empty())
            .ok_or_else(|| AdvisoryError::InvalidResponse("response contained no answer".to_string()))
    }
}
