//! Axum route handlers for the Profile API, including picture and résumé
//! uploads to object storage.

use aws_sdk_s3::primitives::ByteStream;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::extract::AuthSession;
use crate::errors::AppError;
use crate::models::user::{UserProfileRow, UserRow};
use crate::state::AppState;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// Identity fields merged with the extended profile row.
    pub user: Value,
}

/// Partial update: only fields present in the body are written.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    // Basic identity fields
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub company_name: Option<String>,
    // Extended profile fields
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
    pub company_website: Option<String>,
    pub company_description: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub founded_year: Option<i32>,
    pub headquarters_location: Option<String>,
    pub company_logo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/profile
pub async fn handle_get_profile(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = fetch_user(&state, auth.user_id).await?;
    let profile: Option<UserProfileRow> =
        sqlx::query_as("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(auth.user_id)
            .fetch_optional(&state.db)
            .await?;

    let mut merged = serde_json::to_value(&user).map_err(anyhow::Error::from)?;
    if let (Some(obj), Some(profile)) = (merged.as_object_mut(), profile) {
        if let Ok(Value::Object(extra)) = serde_json::to_value(&profile) {
            obj.extend(extra);
        }
    }

    Ok(Json(ProfileResponse { user: merged }))
}

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    auth: AuthSession,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    // Ensure the account still exists before touching either table.
    fetch_user(&state, auth.user_id).await?;

    sqlx::query(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            gender = COALESCE($5, gender),
            age = COALESCE($6, age),
            address = COALESCE($7, address),
            company_name = COALESCE($8, company_name)
        WHERE id = $1
        "#,
    )
    .bind(auth.user_id)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.phone)
    .bind(&req.gender)
    .bind(req.age)
    .bind(&req.address)
    .bind(&req.company_name)
    .execute(&state.db)
    .await?;

    // The profile row normally exists from signup; recreate it if it was lost.
    sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    sqlx::query(
        r#"
        UPDATE user_profiles SET
            linkedin = COALESCE($2, linkedin),
            github = COALESCE($3, github),
            twitter = COALESCE($4, twitter),
            portfolio_website = COALESCE($5, portfolio_website),
            license_number = COALESCE($6, license_number),
            specialization = COALESCE($7, specialization),
            certifications = COALESCE($8, certifications),
            skills = COALESCE($9, skills),
            education = COALESCE($10, education),
            work_experience = COALESCE($11, work_experience),
            publications = COALESCE($12, publications),
            availability = COALESCE($13, availability),
            company_website = COALESCE($14, company_website),
            company_description = COALESCE($15, company_description),
            industry = COALESCE($16, industry),
            company_size = COALESCE($17, company_size),
            founded_year = COALESCE($18, founded_year),
            headquarters_location = COALESCE($19, headquarters_location),
            company_logo = COALESCE($20, company_logo)
        WHERE user_id = $1
        "#,
    )
    .bind(auth.user_id)
    .bind(&req.linkedin)
    .bind(&req.github)
    .bind(&req.twitter)
    .bind(&req.portfolio_website)
    .bind(&req.license_number)
    .bind(&req.specialization)
    .bind(&req.certifications)
    .bind(&req.skills)
    .bind(&req.education)
    .bind(&req.work_experience)
    .bind(&req.publications)
    .bind(&req.availability)
    .bind(&req.company_website)
    .bind(&req.company_description)
    .bind(&req.industry)
    .bind(&req.company_size)
    .bind(req.founded_year)
    .bind(&req.headquarters_location)
    .bind(&req.company_logo)
    .execute(&state.db)
    .await?;

    handle_get_profile(auth, State(state)).await
}

/// POST /api/v1/profile/picture
///
/// Multipart upload of a profile picture. Image extensions only; the stored
/// URL lands on `user_profiles.profile_pic_url`.
pub async fn handle_upload_picture(
    auth: AuthSession,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (filename, data) = read_upload(multipart, "profile_pic").await?;
    let ext = allowed_extension(&filename, IMAGE_EXTENSIONS)?;

    let key = format!("profile-pictures/{}/{}.{ext}", auth.user_id, Uuid::new_v4());
    let url = upload_to_s3(&state, &key, data, &format!("image/{ext}")).await?;

    sqlx::query("UPDATE user_profiles SET profile_pic_url = $2 WHERE user_id = $1")
        .bind(auth.user_id)
        .bind(&url)
        .execute(&state.db)
        .await?;

    Ok(Json(UploadResponse { url }))
}

/// POST /api/v1/profile/resume
///
/// Multipart résumé upload (pdf/doc/docx). Stored on both the profile and
/// the user row, matching where the rest of the API reads it from.
pub async fn handle_upload_resume(
    auth: AuthSession,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let (filename, data) = read_upload(multipart, "resume").await?;
    let ext = allowed_extension(&filename, DOCUMENT_EXTENSIONS)?;

    let key = format!("resumes/{}/{}.{ext}", auth.user_id, Uuid::new_v4());
    let url = upload_to_s3(&state, &key, data, "application/octet-stream").await?;

    sqlx::query("UPDATE user_profiles SET resume_url = $2 WHERE user_id = $1")
        .bind(auth.user_id)
        .bind(&url)
        .execute(&state.db)
        .await?;
    sqlx::query("UPDATE users SET resume_url = $2 WHERE id = $1")
        .bind(auth.user_id)
        .bind(&url)
        .execute(&state.db)
        .await?;

    Ok(Json(UploadResponse { url }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn fetch_user(state: &AppState, user_id: Uuid) -> Result<UserRow, AppError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?;
    user.ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Pulls the named file field out of a multipart body.
async fn read_upload(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(String, bytes::Bytes), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let filename = field
            .file_name()
            .ok_or_else(|| AppError::Validation("No file selected".to_string()))?
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        return Ok((filename, data));
    }
    Err(AppError::Validation(format!("No '{field_name}' file provided")))
}

fn allowed_extension(filename: &str, allowed: &[&str]) -> Result<String, AppError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| allowed.contains(&ext.as_str()));
    ext.ok_or_else(|| {
        AppError::Validation(format!(
            "Invalid file type. Allowed: {}",
            allowed.join(", ")
        ))
    })
}

async fn upload_to_s3(
    state: &AppState,
    key: &str,
    data: bytes::Bytes,
    content_type: &str,
) -> Result<String, AppError> {
    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(key)
        .body(ByteStream::from(data))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

    info!("uploaded s3://{}/{}", state.config.s3_bucket, key);
    Ok(format!(
        "{}/{}/{key}",
        state.config.s3_endpoint.trim_end_matches('/'),
        state.config.s3_bucket
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert_eq!(
            allowed_extension("me.PNG", IMAGE_EXTENSIONS).unwrap(),
            "png"
        );
        assert!(allowed_extension("cv.pdf", IMAGE_EXTENSIONS).is_err());
        assert!(allowed_extension("cv.pdf", DOCUMENT_EXTENSIONS).is_ok());
        assert!(allowed_extension("noextension", DOCUMENT_EXTENSIONS).is_err());
    }
}
