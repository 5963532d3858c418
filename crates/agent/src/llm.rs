use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopsense_core::config::{LlmConfig, LlmProvider};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 512;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Builds the configured backend, or `None` when no backend can be called.
pub fn client_from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>> {
    if !config.is_configured() {
        return Ok(None);
    }
    Ok(Some(Arc::new(HttpLlmClient::from_config(config)?)))
}

enum Backend {
    OpenAi { api_key: SecretString },
    Anthropic { api_key: SecretString },
    Ollama,
}

pub struct HttpLlmClient {
    backend: Backend,
    base_url: String,
    model: String,
    client: Client,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = || {
            config.api_key.clone().with_context(|| {
                format!("llm provider {:?} requires llm.api_key", config.provider)
            })
        };
        let base_url = |default: &str| {
            config
                .base_url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
                .trim_end_matches('/')
                .to_string()
        };

        let (backend, base_url) = match config.provider {
            LlmProvider::OpenAi => (Backend::OpenAi { api_key: api_key()? }, base_url(OPENAI_BASE_URL)),
            LlmProvider::Anthropic => {
                (Backend::Anthropic { api_key: api_key()? }, base_url(ANTHROPIC_BASE_URL))
            }
            LlmProvider::Ollama => {
                let Some(url) = config.base_url.as_deref().filter(|value| !value.trim().is_empty())
                else {
                    bail!("llm provider ollama requires llm.base_url");
                };
                (Backend::Ollama, url.trim().trim_end_matches('/').to_string())
            }
            LlmProvider::None => bail!("llm provider is disabled"),
        };

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build language model HTTP client")?;

        Ok(Self { backend, base_url, model: config.model.clone(), client })
    }

    pub fn provider_name(&self) -> &'static str {
        match self.backend {
            Backend::OpenAi { .. } => "openai",
            Backend::Anthropic { .. } => "anthropic",
            Backend::Ollama => "ollama",
        }
    }

    async fn openai(&self, api_key: &SecretString, prompt: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.expose_secret().trim());
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth).context("invalid OpenAI API key")?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = OpenAiRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;
        let parsed: OpenAiResponse = decode(response, "OpenAI").await?;

        Ok(parsed.choices.into_iter().find_map(|choice| choice.message.content).unwrap_or_default())
    }

    async fn anthropic(&self, api_key: &SecretString, prompt: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.expose_secret().trim())
                .context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("failed to call Anthropic messages")?;
        let parsed: AnthropicResponse = decode(response, "Anthropic").await?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    async fn ollama(&self, prompt: &str) -> Result<String> {
        let body = OllamaRequest { model: &self.model, prompt, stream: false };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .context("failed to call Ollama generate")?;
        let parsed: OllamaResponse = decode(response, "Ollama").await?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match &self.backend {
            Backend::OpenAi { api_key } => self.openai(api_key, prompt).await,
            Backend::Anthropic { api_key } => self.anthropic(api_key, prompt).await,
            Backend::Ollama => self.ollama(prompt).await,
        }
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    provider: &str,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
        bail!("{provider} returned {status}: {text}");
    }
    response.json::<T>().await.with_context(|| format!("failed to parse {provider} response"))
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}
