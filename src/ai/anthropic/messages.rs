use super::client::AnthropicHttpClient;
use super::types::{ContentBlock, ImageSource, Message, MessagesRequest, MessagesResponse};
use crate::ai::{CompletionRequest, ModelProvider};
use crate::models::ChatRole;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Messages API with the photo as a separate base64 image block.
pub struct AnthropicProvider {
    http: AnthropicHttpClient,
}

impl AnthropicProvider {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, timeout: Duration, client: reqwest::Client) -> Self {
        Self {
            http: AnthropicHttpClient::new_with_client(api_key, timeout, client),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    fn build_request(request: &CompletionRequest) -> MessagesRequest {
        let image_turn = request.image_turn();

        // The conversation has to open with a user turn.
        let first_user = request
            .messages
            .iter()
            .position(|t| t.role == ChatRole::User)
            .unwrap_or(request.messages.len());

        let messages = request
            .messages
            .iter()
            .enumerate()
            .skip(first_user)
            .map(|(index, turn)| {
                let mut content = Vec::with_capacity(2);
                if let (Some(image), true) = (&request.image, image_turn == Some(index)) {
                    content.push(ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: image.media_type.mime().to_string(),
                            data: image.base64.clone(),
                        },
                    });
                }
                content.push(ContentBlock::Text {
                    text: turn.content.clone(),
                });
                Message {
                    role: turn.role.as_str().to_string(),
                    content,
                }
            })
            .collect();

        MessagesRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.clone(),
            messages,
        }
    }

    fn extract_text(response: &MessagesResponse) -> Option<String> {
        let text: String = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        tracing::debug!(
            "Sending messages request to Anthropic (model: {}, max tokens: {})",
            request.model,
            request.max_tokens
        );

        let response = self.http.messages(&Self::build_request(request)).await?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(
                "Anthropic response hit the token limit ({} tokens)",
                request.max_tokens
            );
        }

        Self::extract_text(&response)
            .ok_or_else(|| Error::AiProvider("No text content in Anthropic response".to_string()))
    }
}
