//! Session/context loader — assembles the per-request snapshot of profile,
//! jobs, and applications fed to the model prompt.

use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::JobApplicationRow;
use crate::models::job::JobRow;
use crate::models::user::{Role, UserProfileRow, UserRow};

/// Read-only bundle of everything the prompt composer needs. Built once per
/// request; no identity beyond the request lifetime.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub role: Role,
    pub profile: Value,
    pub jobs: Vec<Value>,
    pub applications: Vec<Value>,
}

/// Loads the caller's context snapshot. Fails only when the user record
/// itself no longer resolves; profile, job, and application sub-fetches are
/// independently fault-isolated and degrade to empty values so one broken
/// source never takes down the whole chat request.
pub async fn load_context(db: &PgPool, user_id: Uuid) -> Result<ContextSnapshot, AppError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    let user = user.ok_or_else(|| AppError::NotFound("User no longer exists".to_string()))?;
    let role = user.role();

    let profile = match fetch_profile(db, &user).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!("profile fetch failed for {user_id}, continuing without: {e}");
            json!({})
        }
    };

    let jobs = match fetch_jobs(db).await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!("job fetch failed, continuing without: {e}");
            Vec::new()
        }
    };

    let applications = match fetch_applications(db, user_id, role).await {
        Ok(apps) => apps,
        Err(e) => {
            warn!("application fetch failed for {user_id}, continuing without: {e}");
            Vec::new()
        }
    };

    Ok(ContextSnapshot {
        role,
        profile,
        jobs,
        applications,
    })
}

/// Identity fields merged with the extended profile row (when present),
/// mirroring what the profile endpoint serves.
async fn fetch_profile(db: &PgPool, user: &UserRow) -> Result<Value, sqlx::Error> {
    let profile: Option<UserProfileRow> =
        sqlx::query_as("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user.id)
            .fetch_optional(db)
            .await?;

    let mut merged = serde_json::to_value(user).unwrap_or_else(|_| json!({}));
    if let (Some(obj), Some(profile)) = (merged.as_object_mut(), profile) {
        if let Ok(Value::Object(extra)) = serde_json::to_value(&profile) {
            obj.extend(extra);
        }
    }
    Ok(merged)
}

async fn fetch_jobs(db: &PgPool) -> Result<Vec<Value>, sqlx::Error> {
    let jobs: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC")
        .fetch_all(db)
        .await?;
    Ok(to_values(jobs))
}

/// Employers see applications to their own postings; job seekers see their own.
async fn fetch_applications(
    db: &PgPool,
    user_id: Uuid,
    role: Role,
) -> Result<Vec<Value>, sqlx::Error> {
    let apps: Vec<JobApplicationRow> = match role {
        Role::Employer => {
            sqlx::query_as(
                r#"
                SELECT a.* FROM job_applications a
                JOIN jobs j ON j.id = a.job_id
                WHERE j.posted_by = $1
                "#,
            )
            .bind(user_id)
            .fetch_all(db)
            .await?
        }
        Role::JobSeeker => {
            sqlx::query_as("SELECT * FROM job_applications WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(db)
                .await?
        }
    };
    Ok(to_values(apps))
}

fn to_values<T: serde::Serialize>(rows: Vec<T>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| serde_json::to_value(row).ok())
        .collect()
}
