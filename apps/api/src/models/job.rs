use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub posted_by: Uuid,
    pub title: String,
    pub description: String,
    pub company_name: String,
    pub location: Option<String>,
    pub specialization: Option<String>,
    pub skills_required: Option<String>,
    pub salary_range: Option<String>,
    pub created_at: DateTime<Utc>,
}
