//! Service wiring shared by the HTTP handlers.

use crate::ai::{
    AnthropicProvider, ModelProvider, OpenAiProvider, Providers, UnconfiguredProvider,
};
use crate::config::{Config, ModelRoles, ModelTarget, ProviderKind};
use crate::pipeline::AnalysisPipeline;
use crate::tutor::{SocraticTutor, TutorModel};
use std::sync::Arc;
use tracing::{info, warn};

/// Grading pipeline and tutor behind one handle.
pub struct App {
    pub pipeline: AnalysisPipeline,
    pub tutor: SocraticTutor,
}

/// Injectable provider bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub providers: Providers,
    pub models: ModelRoles,
}

impl App {
    /// Build an app from concrete provider clients.
    ///
    /// Tests use this to inject scripted providers.
    pub fn with_services(services: AppServices) -> Self {
        let AppServices { providers, models } = services;

        let tutor_model = |target: &ModelTarget| TutorModel {
            provider: Arc::clone(providers.get(target.provider)),
            model: target.model.clone(),
        };
        let tutor = SocraticTutor::new(
            tutor_model(&models.tutor_primary),
            tutor_model(&models.tutor_fallback),
        );

        Self {
            pipeline: AnalysisPipeline::new(providers, models),
            tutor,
        }
    }

    /// Construct an app with real provider clients for `config`.
    pub fn from_config(config: &Config) -> Self {
        // Reuse one HTTP connection pool across provider clients.
        let http_client = reqwest::Client::new();

        let provider = |kind: ProviderKind| -> Arc<dyn ModelProvider> {
            let Some(api_key) = config.api_key_for(kind) else {
                warn!("No API key for {}; calls routed to it will fail", kind);
                return Arc::new(UnconfiguredProvider::new(kind.to_string()));
            };
            let api_key = api_key.to_string();
            match kind {
                ProviderKind::OpenAi => Arc::new(OpenAiProvider::new_with_client(
                    api_key,
                    config.provider_timeout,
                    http_client.clone(),
                )),
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::new_with_client(
                    api_key,
                    config.provider_timeout,
                    http_client.clone(),
                )),
            }
        };

        let providers = Providers {
            openai: provider(ProviderKind::OpenAi),
            anthropic: provider(ProviderKind::Anthropic),
        };

        let models = &config.models;
        info!("Classify model: {} ({})", models.classify.model, models.classify.provider);
        info!("Simple model: {} ({})", models.simple.model, models.simple.provider);
        info!("Complex model: {} ({})", models.complex.model, models.complex.provider);
        info!(
            "Tutor models: {} ({}), fallback {} ({})",
            models.tutor_primary.model,
            models.tutor_primary.provider,
            models.tutor_fallback.model,
            models.tutor_fallback.provider
        );

        Self::with_services(AppServices {
            providers,
            models: config.models.clone(),
        })
    }
}
