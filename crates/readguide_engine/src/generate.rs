use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::classify::{parse_classification, truncate_chars};
use crate::{Classification, GenerationParams};

const TRUNCATED_MARKER: &str = "...(content truncated)";
const CLASSIFY_TEMPERATURE: f32 = 0.3;

/// One OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEndpoint {
    /// Selector clients pass as `model`.
    pub name: String,
    pub base_url: String,
    /// Model identifier sent to the endpoint.
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Holds `experts/<profile>.txt` and `classification.txt`.
    pub prompts_dir: PathBuf,
    pub models: Vec<ModelEndpoint>,
    pub default_model: Option<String>,
    pub max_content_chars: usize,
    pub max_classify_chars: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            prompts_dir: PathBuf::from("./prompts"),
            models: Vec::new(),
            default_model: None,
            max_content_chars: 30_000,
            max_classify_chars: 5_000,
        }
    }
}

impl GeneratorSettings {
    /// Explicit selector first, then the configured default, then the first endpoint.
    pub fn resolve_model(&self, selector: Option<&str>) -> Result<&ModelEndpoint, GenerationError> {
        let find = |name: &str| self.models.iter().find(|m| m.name == name);
        match selector {
            Some(name) => find(name).ok_or_else(|| GenerationError::UnknownModel(name.to_string())),
            None => self
                .default_model
                .as_deref()
                .and_then(find)
                .or_else(|| self.models.first())
                .ok_or(GenerationError::NoModelConfigured),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("unknown profile `{0}`")]
    UnknownProfile(String),
    #[error("unknown model `{0}`")]
    UnknownModel(String),
    #[error("no AI model configured")]
    NoModelConfigured,
    #[error("prompt file unavailable: {0}")]
    Prompt(#[from] std::io::Error),
    #[error("AI service returned http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI service timed out")]
    Timeout,
    #[error("AI service network error: {0}")]
    Network(String),
    #[error("AI service returned an unreadable response: {0}")]
    InvalidResponse(String),
    #[error("AI service returned no content")]
    EmptyResponse,
    #[error("generation cancelled")]
    Cancelled,
}

/// Produces a guide from extracted text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError>;

    /// Derive tags and a short description from a finished guide.
    async fn classify(
        &self,
        _guide: &str,
        _params: &GenerationParams,
        _cancel: &CancellationToken,
    ) -> Result<Classification, GenerationError> {
        Ok(Classification::default())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Calls any server implementing the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    settings: GeneratorSettings,
}

impl OpenAiGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| GenerationError::Network(err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    async fn expert_prompt(&self, profile: &str) -> Result<String, GenerationError> {
        if !is_profile_name(profile) {
            return Err(GenerationError::UnknownProfile(profile.to_string()));
        }
        let path = self
            .settings
            .prompts_dir
            .join("experts")
            .join(format!("{profile}.txt"));
        tokio::fs::read_to_string(path)
            .await
            .map(|prompt| prompt.trim().to_string())
            .map_err(|_| GenerationError::UnknownProfile(profile.to_string()))
    }

    async fn complete(
        &self,
        endpoint: &ModelEndpoint,
        system_prompt: &str,
        user_message: &str,
        temperature: f32,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            endpoint.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &endpoint.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: endpoint.max_tokens,
            temperature,
            stream: false,
        };

        let mut builder = self
            .client
            .post(url)
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .json(&request);
        if let Some(key) = endpoint.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let call = async move {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::Status {
                    status: status.as_u16(),
                    body: truncate_chars(&body, 200, ""),
                });
            }
            response
                .json::<ChatResponse>()
                .await
                .map_err(|err| GenerationError::InvalidResponse(err.to_string()))
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            response = call => response?,
        };

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        text: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let system_prompt = self.expert_prompt(&params.profile).await?;
        let endpoint = self.settings.resolve_model(params.model.as_deref())?;
        let content = truncate_chars(text, self.settings.max_content_chars, TRUNCATED_MARKER);
        let user_message =
            format!("Generate a reading guide for the following document:\n\n{content}");
        self.complete(
            endpoint,
            &system_prompt,
            &user_message,
            endpoint.temperature,
            cancel,
        )
        .await
    }

    async fn classify(
        &self,
        guide: &str,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<Classification, GenerationError> {
        let prompt_path = self.settings.prompts_dir.join("classification.txt");
        let system_prompt = tokio::fs::read_to_string(prompt_path).await?;
        let endpoint = self.settings.resolve_model(params.model.as_deref())?;
        let excerpt = truncate_chars(guide, self.settings.max_classify_chars, "");
        let user_message = format!("Reading guide:\n\n{excerpt}");
        let reply = self
            .complete(
                endpoint,
                system_prompt.trim(),
                &user_message,
                CLASSIFY_TEMPERATURE,
                cancel,
            )
            .await?;
        Ok(parse_classification(&reply))
    }
}

fn is_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Profiles with a prompt under `<prompts_dir>/experts`, sorted by name.
pub async fn available_profiles(prompts_dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(prompts_dir.join("experts")).await?;
    let mut profiles = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "txt") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            if is_profile_name(stem) {
                profiles.push(stem.to_string());
            }
        }
    }
    profiles.sort();
    Ok(profiles)
}

fn map_reqwest_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        return GenerationError::Timeout;
    }
    GenerationError::Network(err.to_string())
}
