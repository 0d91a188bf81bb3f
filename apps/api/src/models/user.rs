use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Caller role. Stored as text in `users.role`; anything unrecognized is
/// treated as a job seeker, matching the original application's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employer,
    JobSeeker,
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "employer" => Role::Employer,
            _ => Role::JobSeeker,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employer => "employer",
            Role::JobSeeker => "job_seeker",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub company_name: Option<String>,
    pub resume_url: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }
}

/// Extended profile attributes. Every field is nullable: profiles start
/// empty at signup and are filled in piecemeal, and employer and job-seeker
/// accounts populate disjoint subsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct UserProfileRow {
    pub user_id: Uuid,
    pub profile_pic_url: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub twitter: Option<String>,
    pub portfolio_website: Option<String>,
    pub license_number: Option<String>,
    pub specialization: Option<String>,
    pub certifications: Option<String>,
    pub skills: Option<String>,
    pub education: Option<String>,
    pub work_experience: Option<String>,
    pub publications: Option<String>,
    pub availability: Option<String>,
    pub resume_url: Option<String>,
    pub company_website: Option<String>,
    pub company_description: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub founded_year: Option<i32>,
    pub headquarters_location: Option<String>,
    pub company_logo: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_defaults_to_job_seeker() {
        assert_eq!(Role::parse("employer"), Role::Employer);
        assert_eq!(Role::parse("job_seeker"), Role::JobSeeker);
        assert_eq!(Role::parse("garbage"), Role::JobSeeker);
    }
}
