//! Axum route handlers for the Applications API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extract::AuthSession;
use crate::errors::AppError;
use crate::models::application::{JobApplicationRow, STATUS_PENDING, STATUS_REJECTED};
use crate::models::job::JobRow;
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub resume_link: Option<String>,
    pub cover_letter: Option<String>,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub preferred_shift: Option<String>,
    pub expected_salary: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub applications: Vec<JobApplicationRow>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/v1/jobs/:id/apply
///
/// Job-seeker-only; employers cannot apply to postings.
pub async fn handle_apply(
    auth: AuthSession,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<JobApplicationRow>), AppError> {
    if auth.role == Role::Employer {
        return Err(AppError::Forbidden);
    }

    let job: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?;
    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    if req.applicant_name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::Validation(
            "applicant_name and email are required".to_string(),
        ));
    }

    let application: JobApplicationRow = sqlx::query_as(
        r#"
        INSERT INTO job_applications
            (id, job_id, user_id, applicant_name, email, phone, resume_link,
             cover_letter, qualifications, experience, preferred_shift,
             expected_salary, application_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(job.id)
    .bind(auth.user_id)
    .bind(req.applicant_name.trim())
    .bind(req.email.trim())
    .bind(&req.phone)
    .bind(&req.resume_link)
    .bind(&req.cover_letter)
    .bind(&req.qualifications)
    .bind(&req.experience)
    .bind(&req.preferred_shift)
    .bind(req.expected_salary)
    .bind(STATUS_PENDING)
    .fetch_one(&state.db)
    .await?;

    info!("user {} applied to job {}", auth.user_id, job.id);

    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/applications
///
/// Role-filtered: employers see applications to their own postings, job
/// seekers see their own applications.
pub async fn handle_list_applications(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<ApplicationListResponse>, AppError> {
    let applications: Vec<JobApplicationRow> = match auth.role {
        Role::Employer => {
            sqlx::query_as(
                r#"
                SELECT a.* FROM job_applications a
                JOIN jobs j ON j.id = a.job_id
                WHERE j.posted_by = $1
                ORDER BY a.applied_on DESC
                "#,
            )
            .bind(auth.user_id)
            .fetch_all(&state.db)
            .await?
        }
        Role::JobSeeker => {
            sqlx::query_as(
                "SELECT * FROM job_applications WHERE user_id = $1 ORDER BY applied_on DESC",
            )
            .bind(auth.user_id)
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(Json(ApplicationListResponse { applications }))
}

/// POST /api/v1/applications/:id/status
///
/// Employer-only, and only for applications to the employer's own postings.
/// A "Rejected" update removes the application entirely.
pub async fn handle_update_status(
    auth: AuthSession,
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if auth.role != Role::Employer {
        return Err(AppError::Forbidden);
    }

    let application: Option<JobApplicationRow> = sqlx::query_as(
        r#"
        SELECT a.* FROM job_applications a
        JOIN jobs j ON j.id = a.job_id
        WHERE a.id = $1 AND j.posted_by = $2
        "#,
    )
    .bind(application_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?;
    let application = application
        .ok_or_else(|| AppError::NotFound(format!("Application {application_id} not found")))?;

    if req.status == STATUS_REJECTED {
        sqlx::query("DELETE FROM job_applications WHERE id = $1")
            .bind(application.id)
            .execute(&state.db)
            .await?;
        info!(
            "application {} rejected and removed by employer {}",
            application.id, auth.user_id
        );
        return Ok(Json(MessageResponse {
            message: "Application rejected".to_string(),
        }));
    }

    sqlx::query("UPDATE job_applications SET application_status = $2 WHERE id = $1")
        .bind(application.id)
        .bind(&req.status)
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse {
        message: "Application status updated".to_string(),
    }))
}

/// DELETE /api/v1/applications/:id
///
/// Owner-only withdrawal.
pub async fn handle_withdraw(
    auth: AuthSession,
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = sqlx::query("DELETE FROM job_applications WHERE id = $1 AND user_id = $2")
        .bind(application_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Application {application_id} not found"
        )));
    }

    Ok(Json(MessageResponse {
        message: "Application withdrawn".to_string(),
    }))
}
