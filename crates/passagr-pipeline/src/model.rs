//! The language model behind the extractor.
//!
//! [`ExtractionModel`] is the seam; [`ChatCompletionsModel`] speaks the
//! OpenAI-compatible `/chat/completions` protocol over reqwest.

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("model endpoint returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("model returned no content")]
  EmptyResponse,
}

/// A single extraction prompt.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
  pub system: String,
  pub prompt: String,
}

/// Anything that turns a prompt into a JSON document.
///
/// Returns the raw text of the model's answer; parsing belongs to the
/// extractor.
pub trait ExtractionModel: Send + Sync {
  fn complete(
    &self,
    request: ExtractionRequest,
  ) -> impl Future<Output = Result<String, ModelError>> + Send + '_;
}

// ─── Chat completions ────────────────────────────────────────────────────────

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
  pub base_url:     String,
  pub api_key:      String,
  pub model:        String,
  pub timeout_secs: u64,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      base_url:     "https://api.openai.com/v1".to_owned(),
      api_key:      String::new(),
      model:        "gpt-4-turbo".to_owned(),
      timeout_secs: 60,
    }
  }
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ChatCompletionsModel {
  client: Client,
  config: ModelConfig,
}

impl ChatCompletionsModel {
  pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }
}

#[derive(Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
  content: Option<String>,
}

impl ExtractionModel for ChatCompletionsModel {
  async fn complete(&self, request: ExtractionRequest) -> Result<String, ModelError> {
    let body = json!({
      "model": self.config.model,
      "temperature": 0,
      "response_format": { "type": "json_object" },
      "messages": [
        { "role": "system", "content": request.system },
        { "role": "user", "content": request.prompt },
      ],
    });

    let resp = self
      .client
      .post(self.url())
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(ModelError::Status { status: status.as_u16(), body });
    }

    let parsed: ChatResponse = resp.json().await?;
    parsed
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .filter(|c| !c.trim().is_empty())
      .ok_or(ModelError::EmptyResponse)
  }
}
