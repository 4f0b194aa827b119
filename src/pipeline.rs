//! Homework grading: validate, classify, route, analyze, finalize.
//!
//! The two model calls are strictly sequential because the second one's
//! model, prompt and budget depend on the first one's verdict. A request moves
//! through the stages once, in order, and may exit with an error from any of
//! them.

use crate::ai::{CompletionRequest, Providers};
use crate::config::{ModelRoles, ModelTarget};
use crate::image::{self, ImagePayload};
use crate::models::{Complexity, ComplexityVerdict, HomeworkAnalysis};
use crate::parser::{self, ParseOutcome};
use crate::{prompts, Error, Result};
use std::fmt;
use tracing::{error, info, warn};

const CLASSIFY_MAX_TOKENS: u32 = 150;
const CLASSIFY_TEMPERATURE: f32 = 0.1;

const SIMPLE_MAX_TOKENS: u32 = 2000;
const SIMPLE_TEMPERATURE: f32 = 0.3;

const COMPLEX_MAX_TOKENS: u32 = 4096;
const COMPLEX_TEMPERATURE: f32 = 0.5;

const UNCLEAR_VERDICT_REASON: &str = "Classification unclear; using detailed analysis";
const UNAVAILABLE_VERDICT_REASON: &str = "Classification unavailable; using detailed analysis";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Classifying,
    Routed,
    Analyzing,
    Finalizing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Classifying => "classifying",
            Stage::Routed => "routed",
            Stage::Analyzing => "analyzing",
            Stage::Finalizing => "finalizing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything the analysis call needs, chosen from the complexity verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    pub target: ModelTarget,
    pub prompt: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub fn route(complexity: Complexity, models: &ModelRoles) -> RoutePlan {
    match complexity {
        Complexity::Simple => RoutePlan {
            target: models.simple.clone(),
            prompt: prompts::ANALYZE_SIMPLE,
            max_tokens: SIMPLE_MAX_TOKENS,
            temperature: SIMPLE_TEMPERATURE,
        },
        Complexity::Complex => RoutePlan {
            target: models.complex.clone(),
            prompt: prompts::ANALYZE_COMPLEX,
            max_tokens: COMPLEX_MAX_TOKENS,
            temperature: COMPLEX_TEMPERATURE,
        },
    }
}

/// Read the classifier's answer. Anything unreadable means `complex`.
pub fn verdict_from_text(text: &str) -> ComplexityVerdict {
    parser::parse(text)
        .ok()
        .and_then(|value| serde_json::from_value::<ComplexityVerdict>(value).ok())
        .unwrap_or_else(|| {
            warn!("Could not read classification verdict, defaulting to complex: {}", text);
            ComplexityVerdict::fallback(UNCLEAR_VERDICT_REASON)
        })
}

pub struct AnalysisPipeline {
    providers: Providers,
    models: ModelRoles,
}

impl AnalysisPipeline {
    pub fn new(providers: Providers, models: ModelRoles) -> Self {
        Self { providers, models }
    }

    pub async fn analyze(&self, image_base64: &str) -> Result<HomeworkAnalysis> {
        info!(stage = %Stage::Validating, "Validating homework image");
        let image = image::normalize(image_base64)?;

        info!(
            stage = %Stage::Classifying,
            media_type = image.media_type.mime(),
            bytes = image.byte_len,
            "Classifying homework complexity"
        );
        let verdict = self.classify(&image).await?;

        let plan = route(verdict.complexity, &self.models);
        info!(
            stage = %Stage::Routed,
            complexity = %verdict.complexity,
            provider = %plan.target.provider,
            model = %plan.target.model,
            "Routed homework analysis"
        );

        info!(stage = %Stage::Analyzing, "Requesting homework analysis");
        let request = CompletionRequest::vision(
            plan.target.model.clone(),
            plan.prompt,
            image,
            plan.max_tokens,
            plan.temperature,
        );
        let raw = self
            .providers
            .get(plan.target.provider)
            .complete(&request)
            .await?;

        info!(stage = %Stage::Finalizing, chars = raw.len(), "Parsing homework analysis");
        let analysis = finalize(&raw, verdict, &plan)?;

        info!(
            stage = %Stage::Done,
            total = analysis.total_problems,
            correct = analysis.correct_answers,
            "Homework analysis complete"
        );
        Ok(analysis)
    }

    async fn classify(&self, image: &ImagePayload) -> Result<ComplexityVerdict> {
        let target = &self.models.classify;
        let request = CompletionRequest::vision(
            target.model.clone(),
            prompts::CLASSIFY,
            image.clone(),
            CLASSIFY_MAX_TOKENS,
            CLASSIFY_TEMPERATURE,
        );

        match self.providers.get(target.provider).complete(&request).await {
            Ok(text) => Ok(verdict_from_text(&text)),
            Err(e @ (Error::RateLimited(_) | Error::PaymentRequired(_))) => Err(e),
            Err(e @ Error::InvalidImageFormat(_)) => Err(e),
            Err(e) => {
                warn!("Classification call failed, defaulting to complex: {}", e);
                Ok(ComplexityVerdict::fallback(UNAVAILABLE_VERDICT_REASON))
            }
        }
    }
}

/// Parse the analysis and overwrite everything the server owns.
fn finalize(raw: &str, verdict: ComplexityVerdict, plan: &RoutePlan) -> Result<HomeworkAnalysis> {
    let mut analysis = match parser::parse_analysis(raw) {
        ParseOutcome::Complete(analysis) => analysis,
        ParseOutcome::Partial {
            analysis,
            recovered,
        } => {
            warn!(
                "Recovered {} problems from a damaged analysis response",
                recovered
            );
            analysis
        }
        ParseOutcome::Failed(reason) => {
            error!("Unparseable analysis response ({}): {}", reason, raw);
            return Err(Error::Unparseable(reason));
        }
    };

    if verdict.complexity == Complexity::Simple {
        analysis.focus_areas = None;
        for problem in &mut analysis.problems {
            problem.root_cause = None;
            problem.visual_aid = None;
            problem.step_by_step.clear();
        }
    }

    analysis.recompute_derived();
    analysis.complexity = verdict.complexity;
    analysis.classify_reason = verdict.reason;
    analysis.model_used = plan.target.model.clone();

    Ok(analysis)
}
