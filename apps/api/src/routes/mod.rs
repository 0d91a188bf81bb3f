pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::applications::handlers as application_handlers;
use crate::auth::handlers as auth_handlers;
use crate::chat::handlers as chat_handlers;
use crate::jobs::handlers as job_handlers;
use crate::profile::handlers as profile_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth API
        .route("/api/v1/auth/signup", post(auth_handlers::handle_signup))
        .route("/api/v1/auth/signin", post(auth_handlers::handle_signin))
        .route(
            "/api/v1/auth/request-code",
            post(auth_handlers::handle_request_code),
        )
        .route("/api/v1/auth/verify", post(auth_handlers::handle_verify))
        .route("/api/v1/auth/logout", post(auth_handlers::handle_logout))
        // Profile API
        .route(
            "/api/v1/profile",
            get(profile_handlers::handle_get_profile)
                .put(profile_handlers::handle_update_profile),
        )
        .route(
            "/api/v1/profile/picture",
            post(profile_handlers::handle_upload_picture),
        )
        .route(
            "/api/v1/profile/resume",
            post(profile_handlers::handle_upload_resume),
        )
        // Jobs API
        .route(
            "/api/v1/jobs",
            get(job_handlers::handle_list_jobs).post(job_handlers::handle_create_job),
        )
        .route("/api/v1/jobs/:id", get(job_handlers::handle_get_job))
        .route(
            "/api/v1/jobs/:id/apply",
            post(application_handlers::handle_apply),
        )
        .route(
            "/api/v1/jobs/match",
            post(chat_handlers::handle_match_jobs),
        )
        // Applications API
        .route(
            "/api/v1/applications",
            get(application_handlers::handle_list_applications),
        )
        .route(
            "/api/v1/applications/:id/status",
            post(application_handlers::handle_update_status),
        )
        .route(
            "/api/v1/applications/:id",
            delete(application_handlers::handle_withdraw),
        )
        // Chat API
        .route("/api/v1/chat", post(chat_handlers::handle_chat))
        .route("/api/v1/chat/stream", get(chat_handlers::handle_chat_stream))
        .with_state(state)
}
