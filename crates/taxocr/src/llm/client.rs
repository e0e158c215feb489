use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ModelConfig;
use crate::error::ExtractionError;
use crate::sanitize::preview;

const ERROR_BODY_CHARS: usize = 1000;

/// One chat completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    /// Base64 PNG of the page, sent as a vision input when present.
    pub image_base64: Option<String>,
}

/// A generative model reachable by the extractor.
pub trait GenerativeModel: Send + Sync {
    /// Returns the raw text of the model's reply.
    fn complete(&self, request: &ModelRequest) -> Result<String, ExtractionError>;
}

/// Azure OpenAI chat-completions deployment.
pub struct AzureChatModel {
    url: String,
    api_key: SecretString,
    max_tokens: u32,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

impl AzureChatModel {
    pub fn new(config: &ModelConfig, api_key: SecretString) -> Result<Self, ExtractionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.deployment,
            config.api_version
        );

        Ok(Self {
            url,
            api_key,
            max_tokens: config.max_tokens,
            timeout_secs: config.request_timeout_secs,
            client,
        })
    }

    fn body(&self, request: &ModelRequest) -> Value {
        let user_content = match &request.image_base64 {
            Some(image) => json!([
                {"type": "text", "text": request.user},
                {
                    "type": "image_url",
                    "image_url": {"url": format!("data:image/png;base64,{}", image)}
                }
            ]),
            None => Value::String(request.user.clone()),
        };

        json!({
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": user_content}
            ],
            "temperature": 0.0,
            "max_tokens": self.max_tokens
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GenerativeModel for AzureChatModel {
    fn complete(&self, request: &ModelRequest) -> Result<String, ExtractionError> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", self.api_key.expose_secret())
            .json(&self.body(request))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    ExtractionError::Transport(format!("Cannot connect to model endpoint: {}", e))
                } else {
                    ExtractionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ExtractionError::Credentials(format!(
                "endpoint rejected the API key (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body: preview(&body, ERROR_BODY_CHARS).to_string(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractionError::Transport(format!("Malformed completion body: {}", e)))?;

        first_content(parsed)
    }
}

fn first_content(response: ChatResponse) -> Result<String, ExtractionError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        Err(ExtractionError::EmptyResponse)
    } else {
        Ok(content)
    }
}

/// A model that replays queued replies in order and records every request.
/// Used by tests and dry runs.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ExtractionError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    pub fn with_error(self, error: ExtractionError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, reply: Result<String, ExtractionError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl GenerativeModel for ScriptedModel {
    fn complete(&self, request: &ModelRequest) -> Result<String, ExtractionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or(Err(ExtractionError::EmptyResponse))
    }
}
