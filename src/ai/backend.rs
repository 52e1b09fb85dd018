// =============================================================================
// ai/backend.rs — THE LINE TO THE MODEL
// =============================================================================
//
// The processor only needs one thing from a language model: take a system
// prompt and a user prompt, return the text of the reply. `ChatBackend` is
// that seam. Production talks to any OpenAI-compatible chat completions
// endpoint over reqwest; tests script the replies.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::AiError;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub trait ChatBackend: Send + Sync {
    /// Name used for the breaker and in logs.
    fn name(&self) -> &str;

    fn complete(&self, request: ChatRequest) -> impl Future<Output = Result<String, AiError>> + Send;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireReply,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct HttpChatBackend {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: String,
}

impl HttpChatBackend {
    pub fn new(endpoint: &str, model: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, AiError> {
        let endpoint = Url::parse(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("CourtVisionEngine/0.1")
            .build()?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &str {
        "chat"
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, AiError> {
        let body = WireRequest {
            model: &self.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: WireResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::EmptyResponse)?;

        debug!(
            model = %self.model,
            chars = content.len(),
            "Chat completion received"
        );
        Ok(content)
    }
}
