//! Axum route handlers for the Jobs API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extract::AuthSession;
use crate::errors::AppError;
use crate::models::job::JobRow;
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub specialization: Option<String>,
    pub skills_required: Option<String>,
    pub salary_range: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobRow>,
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    _auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<JobListResponse>, AppError> {
    let jobs: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(JobListResponse { jobs }))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    _auth: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    let job: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    job.map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// POST /api/v1/jobs
///
/// Employer-only. The posting's company name comes from the poster's account.
pub async fn handle_create_job(
    auth: AuthSession,
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    if auth.role != Role::Employer {
        return Err(AppError::Forbidden);
    }
    if req.title.trim().is_empty() || req.description.trim().is_empty() {
        return Err(AppError::Validation(
            "title and description are required".to_string(),
        ));
    }

    let company_name: Option<String> =
        sqlx::query_scalar("SELECT company_name FROM users WHERE id = $1")
            .bind(auth.user_id)
            .fetch_one(&state.db)
            .await?;

    let job: JobRow = sqlx::query_as(
        r#"
        INSERT INTO jobs
            (id, posted_by, title, description, company_name, location,
             specialization, skills_required, salary_range)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(req.title.trim())
    .bind(req.description.trim())
    .bind(company_name.unwrap_or_default())
    .bind(&req.location)
    .bind(&req.specialization)
    .bind(&req.skills_required)
    .bind(&req.salary_range)
    .fetch_one(&state.db)
    .await?;

    info!("employer {} posted job '{}'", auth.user_id, job.title);

    Ok((StatusCode::CREATED, Json(job)))
}
