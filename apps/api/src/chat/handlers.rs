//! Axum route handlers for the Chat/Match API.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::extract::AuthSession;
use crate::chat::context::load_context;
use crate::chat::normalize::{normalize_reply, rank_jobs, ChatEnvelope};
use crate::chat::prompts::{compose_blocking_prompt, compose_ranking_prompt, compose_streaming_prompt};
use crate::chat::stream::{frame_stream, StreamFrame, STREAM_ERROR_TEXT};
use crate::errors::AppError;
use crate::llm_client::GenerativeModel;
use crate::state::AppState;

/// Sent as an SSE data frame after the last payload on every path.
const DONE_SENTINEL: &str = "[DONE]";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatStreamQuery {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub profile: Option<Value>,
    pub jobs: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub ranked_jobs: Vec<Value>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat
///
/// Blocking mode: one model call, one `{reply, action}` envelope back. An
/// upstream failure degrades to a fixed apologetic envelope rather than a
/// raw 5xx — the happy-path contract always returns a parseable body.
pub async fn handle_chat(
    auth: AuthSession,
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatEnvelope>, AppError> {
    let snapshot = load_context(&state.db, auth.user_id).await?;
    let prompt = compose_blocking_prompt(&snapshot, &req.message);

    Ok(Json(blocking_reply(state.model.as_ref(), &prompt).await))
}

/// One model call, one envelope. An upstream failure degrades to a fixed
/// apologetic envelope instead of surfacing an error.
async fn blocking_reply(model: &dyn GenerativeModel, prompt: &str) -> ChatEnvelope {
    match model.generate(prompt).await {
        Ok(raw) => normalize_reply(&raw),
        Err(e) => {
            warn!("blocking chat call failed: {e}");
            ChatEnvelope::plain(STREAM_ERROR_TEXT)
        }
    }
}

/// GET /api/v1/chat/stream?message=…
///
/// Streaming mode: paragraphs are pushed as they complete, then the final
/// payload, then the `[DONE]` sentinel. SSE uses GET, so the message rides
/// in the query string.
pub async fn handle_chat_stream(
    auth: AuthSession,
    State(state): State<AppState>,
    Query(query): Query<ChatStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    info!(
        "chat stream request user_id={} msg_len={}",
        auth.user_id,
        query.message.len()
    );

    let snapshot = load_context(&state.db, auth.user_id).await?;
    let prompt = compose_streaming_prompt(&snapshot, &query.message);
    let model = state.model.clone();

    let events = async_stream::stream! {
        match model.generate_stream(&prompt).await {
            Ok(fragments) => {
                let mut frames = std::pin::pin!(frame_stream(fragments));
                while let Some(frame) = frames.next().await {
                    yield Ok(frame_to_event(frame));
                }
            }
            Err(e) => {
                // The stream never even opened; same degraded contract as a
                // mid-stream failure.
                warn!("model stream failed to start: {e}");
                yield Ok(frame_to_event(StreamFrame::bot(STREAM_ERROR_TEXT.to_string())));
                yield Ok(frame_to_event(StreamFrame::Done));
            }
        }
    };

    Ok(Sse::new(events))
}

fn frame_to_event(frame: StreamFrame) -> Event {
    match frame {
        StreamFrame::Payload(payload) => Event::default()
            .data(serde_json::to_string(&payload).unwrap_or_else(|_| DONE_SENTINEL.to_string())),
        StreamFrame::Done => Event::default().data(DONE_SENTINEL),
    }
}

/// POST /api/v1/jobs/match
///
/// Ranks the submitted jobs against the submitted profile. Model or parse
/// failure returns the job list unchanged (identity fallback).
pub async fn handle_match_jobs(
    _auth: AuthSession,
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchResponse>, AppError> {
    let profile = req
        .profile
        .ok_or_else(|| AppError::Validation("profile is required".to_string()))?;
    let jobs = match req.jobs {
        Some(jobs) if !jobs.is_empty() => jobs,
        _ => return Err(AppError::Validation("jobs are required".to_string())),
    };

    let prompt = compose_ranking_prompt(&profile, &jobs);

    let ranked = match state.model.generate(&prompt).await {
        Ok(raw) => rank_jobs(&raw, &jobs),
        Err(e) => {
            warn!("ranking call failed, returning jobs unranked: {e}");
            jobs
        }
    };

    Ok(Json(MatchResponse { ranked_jobs: ranked }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::build_router;
    use crate::state::test_support::{test_state_with_model, FakeModel};

    #[tokio::test]
    async fn blocking_reply_parses_a_structured_answer() {
        let model = FakeModel::replying(
            r#"{"reply": "Here you go.", "action": {"type": "redirect", "url": "/jobs"}}"#,
        );

        let envelope = blocking_reply(&model, "show me jobs").await;

        assert_eq!(envelope.reply, "Here you go.");
        assert_eq!(envelope.action.as_ref().unwrap().url, "/jobs");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn blocking_reply_degrades_when_the_model_is_down() {
        let model = FakeModel::down();

        let envelope = blocking_reply(&model, "hello").await;

        assert_eq!(envelope.reply, STREAM_ERROR_TEXT);
        assert!(envelope.action.is_none());
    }

    #[tokio::test]
    async fn chat_without_a_session_is_401_before_the_model() {
        let model = Arc::new(FakeModel::replying("should never be asked"));
        let app = build_router(test_state_with_model(model.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message": "hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn chat_stream_without_a_session_is_401_before_the_model() {
        let model = Arc::new(FakeModel::replying("should never be asked"));
        let app = build_router(test_state_with_model(model.clone()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/chat/stream?message=hi")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(model.calls(), 0);
    }
}
