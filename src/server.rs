//! HTTP surface: `/analyze-homework`, `/homework-chat` and `/health`.
//!
//! Every failure leaves as `{"error": <code>, "message": <friendly text>}`
//! with the status its [`ErrorKind`](crate::ErrorKind) dictates.

use crate::app::App;
use crate::models::{ChatTurn, HomeworkAnalysis, TutorReply};
use crate::tutor::TutorRequest;
use crate::Error;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image_base64: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub child_name: Option<String>,
    #[serde(default, deserialize_with = "crate::models::lenient::optional_number")]
    pub child_grade: Option<u32>,
    #[serde(default)]
    pub problem: Option<String>,
}

impl From<ChatRequest> for TutorRequest {
    fn from(request: ChatRequest) -> Self {
        TutorRequest {
            messages: request.messages,
            child_name: request.child_name,
            child_grade: request.child_grade,
            problem: request.problem,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: &'static str,
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = StatusCode::from_u16(kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self.0, code = kind.code(), "Request failed");
        } else {
            warn!(error = %self.0, code = kind.code(), "Request rejected");
        }

        let body = Json(ErrorBody {
            error: kind.code(),
            message: kind.user_message(),
        });
        (status, body).into_response()
    }
}

/// Bodies that fail to decode count as a request without the required field.
/// An oversized body gets the endpoint's own `oversized` error.
fn rejection_error(rejection: JsonRejection, missing: Error, oversized: Error) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Request body too large: {}", rejection.body_text());
        return oversized.into();
    }
    warn!("Malformed request body: {}", rejection.body_text());
    missing.into()
}

/// Build the router with CORS, request tracing and the body size limit.
pub fn router(app: Arc<App>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze-homework", post(analyze_homework))
        .route("/homework-chat", post(homework_chat))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze_homework(
    State(app): State<Arc<App>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<HomeworkAnalysis>, ApiError> {
    let request_id = Uuid::new_v4();
    analyze(&app, payload)
        .instrument(info_span!("analyze_homework", %request_id))
        .await
}

async fn analyze(
    app: &App,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<HomeworkAnalysis>, ApiError> {
    let Json(request) = payload.map_err(|r| {
        rejection_error(
            r,
            Error::MissingImage,
            Error::InvalidImageFormat("image exceeds the request size limit".to_string()),
        )
    })?;
    let image = request
        .image_base64
        .filter(|s| !s.trim().is_empty())
        .ok_or(Error::MissingImage)?;

    info!("Received homework photo ({} base64 chars)", image.len());
    let analysis = app.pipeline.analyze(&image).await?;
    info!(
        "Analysis complete: {}/{} correct",
        analysis.correct_answers, analysis.total_problems
    );
    Ok(Json(analysis))
}

async fn homework_chat(
    State(app): State<Arc<App>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TutorReply>, ApiError> {
    let request_id = Uuid::new_v4();
    chat(&app, payload)
        .instrument(info_span!("homework_chat", %request_id))
        .await
}

async fn chat(
    app: &App,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<TutorReply>, ApiError> {
    let Json(request) = payload
        .map_err(|r| rejection_error(r, Error::MissingMessages, Error::MissingMessages))?;
    if request.messages.is_empty() {
        return Err(Error::MissingMessages.into());
    }

    info!("Chat turn {} received", request.messages.len());
    let reply = app.tutor.respond(&request.into()).await?;
    Ok(Json(reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_api_error_uses_kind_status_and_code() {
        let response = ApiError(Error::PaymentRequired("credit".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "payment_required");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("taking a little nap"));
    }

    #[tokio::test]
    async fn test_api_error_hides_internal_detail() {
        let response =
            ApiError(Error::Config("ANTHROPIC_API_KEY is not configured".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "server_error");
        assert!(!body["message"].as_str().unwrap().contains("API_KEY"));
    }

    #[test]
    fn test_chat_request_accepts_camel_case() {
        let request: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [{ "role": "user", "content": "I think it's 15" }],
            "childName": "Maya",
            "childGrade": 2,
            "problem": "23 - 8"
        }))
        .unwrap();

        let tutor: TutorRequest = request.into();
        assert_eq!(tutor.child_name.as_deref(), Some("Maya"));
        assert_eq!(tutor.child_grade, Some(2));
        assert_eq!(tutor.messages, vec![ChatTurn::user("I think it's 15")]);
    }

    #[test]
    fn test_chat_request_reads_loose_grades() {
        let parse = |grade: serde_json::Value| -> ChatRequest {
            serde_json::from_value(serde_json::json!({
                "messages": [{ "role": "user", "content": "help" }],
                "childGrade": grade
            }))
            .unwrap()
        };

        assert_eq!(parse(serde_json::json!("2")).child_grade, Some(2));
        assert_eq!(parse(serde_json::json!(3)).child_grade, Some(3));
        assert_eq!(parse(serde_json::json!("second")).child_grade, None);
        assert_eq!(parse(serde_json::Value::Null).child_grade, None);
    }

    #[test]
    fn test_analyze_request_image_is_optional_in_schema() {
        let request: AnalyzeRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(request.image_base64.is_none());
    }
}
