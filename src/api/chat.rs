use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::api::CompletionResponse;
use crate::core::chat_stream::{extract_error_summary, FragmentStream};
use crate::core::error::ChatError;
use crate::core::request::{validate_credential, RequestConfig};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, CHAT_COMPLETIONS_PATH};

pub type ResponseBody = BoxStream<'static, reqwest::Result<Bytes>>;

/// Client for the chat-completions endpoint.
#[derive(Clone, Debug)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the request and return the raw response once the status is known
    /// to be successful.
    pub async fn send(&self, config: &RequestConfig) -> Result<reqwest::Response, ChatError> {
        validate_credential(&config.credential)?;

        debug!(
            model = %config.model,
            stream = config.stream,
            messages = config.messages.len(),
            max_tokens = ?config.max_tokens,
            data_collection = config.data_collection.as_str(),
            training_data = config.training_data.as_str(),
            output_publishing = config.output_publishing.as_str(),
            "Sending chat completion request"
        );

        let url = construct_api_url(&self.base_url, CHAT_COMPLETIONS_PATH);
        let request = add_auth_headers(
            self.http
                .post(url)
                .header("Content-Type", "application/json"),
            Some(&config.credential),
        );

        let response = request
            .json(&config.to_body())
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "Chat request failed before a response arrived");
                ChatError::NetworkFailure(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = upstream_error(status, &body);
            warn!(status = status.as_u16(), error = %err, "Chat endpoint returned an error");
            return Err(err);
        }

        Ok(response)
    }

    /// Send a streaming request and decode its body fragment by fragment.
    pub async fn stream(
        &self,
        config: &RequestConfig,
    ) -> Result<FragmentStream<ResponseBody>, ChatError> {
        let response = self.send(config).await?;
        let has_body = response.content_length() != Some(0);
        let body = has_body.then(|| response.bytes_stream().boxed());
        FragmentStream::new(body)
    }

    /// Send a non-streaming request and return `choices[0].message.content`.
    pub async fn complete(&self, config: &RequestConfig) -> Result<String, ChatError> {
        let mut config = config.clone();
        config.stream = false;

        let response = self.send(&config).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ChatError::NetworkFailure(err.to_string()))?;

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|err| {
            debug!(error = %err, "Completion body did not parse");
            ChatError::upstream(Some(status.as_u16()), "unexpected completion response")
        })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

fn upstream_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| extract_error_summary(&value))
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    ChatError::upstream(Some(status.as_u16()), message)
}
