//! Wire types for the OpenRouter chat-completions and model-directory
//! endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod chat;
pub mod models;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: WireContent,
}

/// Plain text, or a multi-part array when an image is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataPolicy {
    Allow,
    Deny,
}

impl DataPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DataPolicy::Allow => "allow",
            DataPolicy::Deny => "deny",
        }
    }
}

impl TryFrom<&str> for DataPolicy {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" | "on" | "true" => Ok(DataPolicy::Allow),
            "deny" | "off" | "false" => Ok(DataPolicy::Deny),
            other => Err(format!("expected allow or deny, got '{other}'")),
        }
    }
}

/// Provider routing preferences understood by OpenRouter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPreferences {
    pub data_collection: DataPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderPreferences>,
}

#[derive(Deserialize, Default)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: ChatResponseDelta,
}

/// One streamed completion chunk.
#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

#[derive(Deserialize)]
pub struct CompletionMessage {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

/// Body of a non-streaming completion.
#[derive(Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DescriptorPricing {
    pub prompt: Option<String>,
    pub completion: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Architecture {
    pub modality: Option<String>,
    #[serde(default)]
    pub input_modalities: Option<Vec<String>>,
    #[serde(default)]
    pub tokenizer: Option<String>,
    #[serde(default)]
    pub instruct_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopProvider {
    pub max_completion_tokens: Option<u64>,
    pub is_moderated: Option<bool>,
}

/// A model entry of the remote directory. `id` and `context_length` are
/// required; entries without them are skipped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub context_length: u64,
    #[serde(default)]
    pub pricing: Option<DescriptorPricing>,
    #[serde(default)]
    pub architecture: Option<Architecture>,
    #[serde(default)]
    pub top_provider: Option<TopProvider>,
}

/// The directory envelope. Entries stay untyped until they are validated one
/// by one, so a single odd entry cannot sink the whole listing.
#[derive(Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub data: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_message_serializes_as_parts() {
        let message = WireMessage {
            role: WireRole::User,
            content: WireContent::Parts(vec![
                ContentPart::Text {
                    text: "what is this".into(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".into(),
                    },
                },
            ]),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn request_omits_unset_optionals() {
        let request = ChatRequest {
            model: "openai/gpt-4o".into(),
            messages: vec![WireMessage {
                role: WireRole::System,
                content: WireContent::Text("be brief".into()),
            }],
            temperature: 0.5,
            top_p: 1.0,
            stream: true,
            max_tokens: None,
            provider: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("max_tokens").is_none());
        assert!(value.get("provider").is_none());
        assert_eq!(value["messages"][0]["content"], "be brief");
    }

    #[test]
    fn chunk_without_delta_content_has_none() {
        let chunk: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(chunk.first_content(), None);

        let empty: ChatResponse = serde_json::from_str(r#"{"id":"gen-1"}"#).unwrap();
        assert_eq!(empty.first_content(), None);
    }

    #[test]
    fn data_policy_parses_loosely() {
        assert_eq!(DataPolicy::try_from("Deny"), Ok(DataPolicy::Deny));
        assert_eq!(DataPolicy::try_from("on"), Ok(DataPolicy::Allow));
        assert!(DataPolicy::try_from("maybe").is_err());
    }

    #[test]
    fn descriptor_requires_context_length() {
        let missing = serde_json::from_value::<ModelDescriptor>(json!({"id": "a/b"}));
        assert!(missing.is_err());

        let ok: ModelDescriptor = serde_json::from_value(json!({
            "id": "a/b",
            "context_length": 8192,
            "pricing": {"prompt": "0", "completion": "0"}
        }))
        .unwrap();
        assert_eq!(ok.name, None);
        assert_eq!(ok.architecture, None);
    }
}
