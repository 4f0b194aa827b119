//! Socratic tutoring chat.
//!
//! Each call receives the whole transcript and returns the next tutor turn.
//! The model marks the turn that finishes a problem with [`SOLVED_MARKER`];
//! the marker is turned into the `solved` flag and never shown to the child.

use crate::ai::{CompletionRequest, ModelProvider};
use crate::models::{ChatTurn, TutorReply};
use crate::{prompts, Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const SOLVED_MARKER: &str = "[SOLVED]";

const TUTOR_MAX_TOKENS: u32 = 500;
const TUTOR_TEMPERATURE: f32 = 0.7;
const SOLVED_WITHOUT_TEXT: &str = "You did it! Great job!";

const DEFAULT_CHILD_NAME: &str = "the student";
const DEFAULT_PROBLEM: &str = "(The student will tell you which problem they are working on.)";

/// One chat call as sent by the client.
#[derive(Debug, Clone, Default)]
pub struct TutorRequest {
    pub messages: Vec<ChatTurn>,
    pub child_name: Option<String>,
    pub child_grade: Option<u32>,
    pub problem: Option<String>,
}

/// Split the solved signal out of raw model text.
///
/// Returns the text with every marker removed and whether one was present.
pub fn detect_solved(raw: &str) -> (String, bool) {
    let solved = raw.contains(SOLVED_MARKER);
    let reply = raw.replace(SOLVED_MARKER, "").trim().to_string();
    (reply, solved)
}

/// Render the tutoring policy for one child and problem.
pub fn system_prompt(request: &TutorRequest) -> String {
    let name = request
        .child_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_CHILD_NAME);
    let grade = request
        .child_grade
        .map(|g| g.to_string())
        .unwrap_or_else(|| "1-5".to_string());
    let problem = request
        .problem
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PROBLEM);

    prompts::render(
        prompts::TUTOR_SYSTEM,
        &[
            ("name", name),
            ("grade", &grade),
            ("problem", problem),
            ("marker", SOLVED_MARKER),
        ],
    )
}

/// A provider paired with the model it should run.
#[derive(Clone)]
pub struct TutorModel {
    pub provider: Arc<dyn ModelProvider>,
    pub model: String,
}

pub struct SocraticTutor {
    primary: TutorModel,
    fallback: TutorModel,
}

impl SocraticTutor {
    pub fn new(primary: TutorModel, fallback: TutorModel) -> Self {
        Self { primary, fallback }
    }

    pub async fn respond(&self, request: &TutorRequest) -> Result<TutorReply> {
        if request.messages.is_empty() {
            return Err(Error::MissingMessages);
        }

        let system = system_prompt(request);
        let call = |model: &TutorModel| {
            CompletionRequest::conversation(
                model.model.clone(),
                system.clone(),
                request.messages.clone(),
                TUTOR_MAX_TOKENS,
                TUTOR_TEMPERATURE,
            )
        };

        let raw = match self
            .primary
            .provider
            .complete(&call(&self.primary))
            .await
        {
            Ok(text) => text,
            Err(e @ Error::RateLimited(_)) => {
                warn!("Primary tutor provider is rate limited: {}", e);
                return Err(e);
            }
            Err(primary_err) => {
                warn!(
                    "Primary tutor provider {} failed, trying {}: {}",
                    self.primary.provider.name(),
                    self.fallback.provider.name(),
                    primary_err
                );
                self.fallback
                    .provider
                    .complete(&call(&self.fallback))
                    .await
                    .map_err(|fallback_err| {
                        error!("Fallback tutor provider failed: {}", fallback_err);
                        Error::ProvidersExhausted(format!(
                            "primary: {}; fallback: {}",
                            primary_err, fallback_err
                        ))
                    })?
            }
        };

        let (reply, solved) = detect_solved(&raw);
        let reply = if reply.is_empty() && solved {
            SOLVED_WITHOUT_TEXT.to_string()
        } else {
            reply
        };

        info!(solved, turns = request.messages.len(), "Tutor replied");
        Ok(TutorReply { reply, solved })
    }
}
