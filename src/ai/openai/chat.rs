use super::client::OpenAiHttpClient;
use super::types::{ChatCompletionRequest, ChatMessage, ChatMessageContent, MessagePart};
use crate::ai::{CompletionRequest, ModelProvider};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Chat completions with the photo sent inline as an `image_url` data URL.
pub struct OpenAiProvider {
    http: OpenAiHttpClient,
}

impl OpenAiProvider {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, timeout: Duration, client: reqwest::Client) -> Self {
        Self {
            http: OpenAiHttpClient::new_with_client(api_key, timeout, client),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    fn build_request(request: &CompletionRequest) -> ChatCompletionRequest {
        let image_turn = request.image_turn();
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatMessageContent::Text(system.clone())),
            });
        }

        for (index, turn) in request.messages.iter().enumerate() {
            let content = match (&request.image, image_turn == Some(index)) {
                (Some(image), true) => ChatMessageContent::Parts(vec![
                    MessagePart::text(turn.content.clone()),
                    MessagePart::image(image.data_url()),
                ]),
                _ => ChatMessageContent::Text(turn.content.clone()),
            };
            messages.push(ChatMessage {
                role: turn.role.as_str().to_string(),
                content: Some(content),
            });
        }

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            max_completion_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        tracing::debug!(
            "Sending chat completion to OpenAI (model: {}, max tokens: {})",
            request.model,
            request.max_tokens
        );

        let response = self
            .http
            .chat_completion(&Self::build_request(request))
            .await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| Error::AiProvider("No choices in OpenAI response".to_string()))?;

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!(
                "OpenAI response hit the token limit ({} tokens)",
                request.max_tokens
            );
        }

        match &choice.message.content {
            Some(ChatMessageContent::Text(text)) if !text.trim().is_empty() => Ok(text.clone()),
            _ => Err(Error::AiProvider(
                "No text content in OpenAI response".to_string(),
            )),
        }
    }
}
