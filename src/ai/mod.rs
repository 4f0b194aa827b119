//! Hosted model integration
//!
//! Both vision/chat providers sit behind [`ModelProvider`], so grading,
//! routing and tutoring never see a provider-specific payload.

pub mod anthropic;
pub mod failure;
pub mod mock;
pub mod openai;

#[cfg(test)]
pub(crate) mod test_support;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

use crate::config::ProviderKind;
use crate::image::ImagePayload;
use crate::models::{ChatRole, ChatTurn};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Provider-neutral completion call.
///
/// When `image` is set it is attached to the first user turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatTurn>,
    pub image: Option<ImagePayload>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// A single user prompt about one image.
    pub fn vision(
        model: impl Into<String>,
        prompt: impl Into<String>,
        image: ImagePayload,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            model: model.into(),
            system: None,
            messages: vec![ChatTurn::user(prompt)],
            image: Some(image),
            max_tokens,
            temperature,
        }
    }

    /// A text-only conversation under a system instruction.
    pub fn conversation(
        model: impl Into<String>,
        system: impl Into<String>,
        messages: Vec<ChatTurn>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            model: model.into(),
            system: Some(system.into()),
            messages,
            image: None,
            max_tokens,
            temperature,
        }
    }

    /// Index of the turn that carries the image, if any.
    pub fn image_turn(&self) -> Option<usize> {
        self.image.as_ref()?;
        self.messages.iter().position(|t| t.role == ChatRole::User)
    }
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one completion and return the model's text.
    ///
    /// Failures are already classified (rate limit, billing, image
    /// rejection, ...). Implementations never retry.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Stand-in for a provider whose API key was not supplied.
pub struct UnconfiguredProvider {
    name: String,
}

impl UnconfiguredProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ModelProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(Error::Config(format!(
            "{} API key is not configured",
            self.name
        )))
    }
}

/// One client per provider kind, shared by every request.
#[derive(Clone)]
pub struct Providers {
    pub openai: Arc<dyn ModelProvider>,
    pub anthropic: Arc<dyn ModelProvider>,
}

impl Providers {
    pub fn get(&self, kind: ProviderKind) -> &Arc<dyn ModelProvider> {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
        }
    }
}
