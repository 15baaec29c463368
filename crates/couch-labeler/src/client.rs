//! OpenAI chat-completions client returning a structured colour label.

use async_trait::async_trait;
use couch_models::CouchColourLabel;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{LabelerError, LabelerResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Zero-shot instruction sent as the system message.
pub const PROMPT: &str = "\nYou will see a still from a video. What color is the couch in the image? \
Use a single word to describe the color, e.g. 'white', 'black', 'grey', 'beige', 'blue', 'green', \
'red', 'brown', 'purple', 'yellow', 'orange', 'pink'. If the couch has multiple colors, choose the \
most prominent one. \n";

const SCHEMA_NAME: &str = "CouchColourClassification";

/// Anything that can name the colour of the couch in a public image.
#[async_trait]
pub trait ColorLabeler: Send + Sync {
    async fn classify(&self, image_url: &str) -> LabelerResult<CouchColourLabel>;
}

#[derive(Debug, Clone)]
pub struct LabelerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl LabelerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum Message<'a> {
    System { content: &'a str },
    User { content: Vec<ContentPart<'a>> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// JSON schema of [`CouchColourLabel`] in the shape the structured-output API accepts.
pub fn label_schema() -> serde_json::Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(CouchColourLabel))
        .unwrap_or(serde_json::Value::Null);
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
    }
    schema
}

/// Labeler backed by the OpenAI chat completions endpoint.
pub struct OpenAiLabeler {
    client: Client,
    config: LabelerConfig,
}

impl OpenAiLabeler {
    pub fn new(config: LabelerConfig) -> LabelerResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LabelerError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LabelerError::request(format!("Failed to build HTTP client: {}", e)))?;

        info!(model = %config.model, base_url = %config.base_url, "Labeler initialized");
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ColorLabeler for OpenAiLabeler {
    async fn classify(&self, image_url: &str) -> LabelerResult<CouchColourLabel> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message::System { content: PROMPT },
                Message::User {
                    content: vec![ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    }],
                },
            ],
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: SCHEMA_NAME,
                    schema: label_schema(),
                    strict: true,
                },
            },
            max_tokens: self.config.max_tokens,
        };

        debug!(image_url = %image_url, "Requesting colour label");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LabelerError::request(format!("Labeler request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LabelerError::Api { status, body });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LabelerError::invalid_response(format!("Failed to parse response: {}", e)))?;

        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LabelerError::invalid_response("No choices in response"))?;

        if let Some(refusal) = message.refusal {
            return Err(LabelerError::Refused(refusal));
        }

        let content = message
            .content
            .ok_or_else(|| LabelerError::invalid_response("Empty message content"))?;

        serde_json::from_str::<CouchColourLabel>(content.trim())
            .map_err(|e| LabelerError::invalid_response(format!("Label does not match schema: {}", e)))
    }
}
