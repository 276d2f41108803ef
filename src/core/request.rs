//! Validated chat-completion requests.

use std::collections::HashMap;

use crate::api::{ChatRequest, DataPolicy, ProviderPreferences, WireMessage};
use crate::core::error::ChatError;

pub const CREDENTIAL_PREFIX: &str = "sk-or-v1-";
pub const FREE_SUFFIX: &str = ":free";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Catalogued models that misbehave without an explicit completion cap.
pub const DEFAULT_TOKEN_CAPS: &[(&str, u32)] = &[
    ("openai/gpt-oss-120b:free", 8192),
    ("deepseek/deepseek-chat-v3.1:free", 8192),
    ("meta-llama/llama-3.2-90b-vision-instruct:free", 4096),
];

pub fn is_free_model(model_id: &str) -> bool {
    model_id.ends_with(FREE_SUFFIX)
}

pub fn validate_credential(credential: &str) -> Result<(), ChatError> {
    if credential.is_empty() || !credential.starts_with(CREDENTIAL_PREFIX) {
        return Err(ChatError::InvalidCredential);
    }
    Ok(())
}

/// Caller-supplied request inputs. `None` means "use the default".
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub credential: String,
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stream: Option<bool>,
    pub max_tokens: Option<u32>,
    pub data_collection: Option<DataPolicy>,
    pub training_data: Option<DataPolicy>,
    pub output_publishing: Option<DataPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub credential: String,
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub stream: bool,
    pub max_tokens: Option<u32>,
    pub data_collection: DataPolicy,
    pub training_data: DataPolicy,
    pub output_publishing: DataPolicy,
}

impl RequestConfig {
    /// JSON body for `POST /chat/completions`.
    pub fn to_body(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            stream: self.stream,
            max_tokens: self.max_tokens,
            provider: Some(ProviderPreferences {
                data_collection: self.data_collection,
            }),
        }
    }
}

/// Builds [`RequestConfig`]s, applying per-model defaults.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    token_caps: HashMap<String, u32>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            token_caps: DEFAULT_TOKEN_CAPS
                .iter()
                .map(|(id, cap)| (id.to_string(), *cap))
                .collect(),
        }
    }
}

impl RequestBuilder {
    /// Extend or override the built-in token cap table.
    pub fn with_token_caps<I>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        self.token_caps.extend(caps);
        self
    }

    pub fn token_cap(&self, model_id: &str) -> Option<u32> {
        self.token_caps.get(model_id).copied()
    }

    pub fn build(&self, options: RequestOptions) -> Result<RequestConfig, ChatError> {
        validate_credential(&options.credential)?;

        if options.model.trim().is_empty() {
            return Err(ChatError::InvalidModel);
        }
        if options.messages.is_empty() {
            return Err(ChatError::EmptyMessages);
        }

        let default_policy = if is_free_model(&options.model) {
            DataPolicy::Deny
        } else {
            DataPolicy::Allow
        };
        let max_tokens = options
            .max_tokens
            .or_else(|| self.token_cap(&options.model));

        Ok(RequestConfig {
            temperature: clamp_unit(options.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            top_p: clamp_unit(options.top_p.unwrap_or(DEFAULT_TOP_P)),
            stream: options.stream.unwrap_or(true),
            max_tokens,
            data_collection: options.data_collection.unwrap_or(default_policy),
            training_data: options.training_data.unwrap_or(default_policy),
            output_publishing: options.output_publishing.unwrap_or(default_policy),
            credential: options.credential,
            model: options.model,
            messages: options.messages,
        })
    }
}

/// [`RequestBuilder::build`] with the built-in token cap table.
pub fn build_request(options: RequestOptions) -> Result<RequestConfig, ChatError> {
    RequestBuilder::default().build(options)
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
