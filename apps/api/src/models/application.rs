use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Application lifecycle status. Free-form text in the original schema;
/// "Pending" on creation, employer-set afterwards. A "Rejected" update
/// deletes the row instead of persisting the status.
pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_REJECTED: &str = "Rejected";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobApplicationRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub applicant_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub resume_link: Option<String>,
    pub cover_letter: Option<String>,
    pub qualifications: Option<String>,
    pub experience: Option<String>,
    pub preferred_shift: Option<String>,
    pub expected_salary: Option<f64>,
    pub application_status: String,
    pub applied_on: DateTime<Utc>,
}
