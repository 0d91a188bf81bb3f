//! Axum route handlers for the Auth API.

use std::time::Duration;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::AppendHeaders;
use axum::Json;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extract::{AuthSession, SESSION_COOKIE};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::{
    create_session, destroy_session, put_verification_code, redeem_verification_code, SessionData,
};
use crate::errors::AppError;
use crate::models::user::{Role, UserRow};
use crate::state::AppState;

const VERIFICATION_CODE_TTL: Duration = Duration::from_secs(10 * 60);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub phone: String,
    pub email: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
    pub company_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    /// Username or email address.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SigninResponse {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RequestCodeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/auth/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), AppError> {
    let required = [
        ("first_name", &req.first_name),
        ("last_name", &req.last_name),
        ("username", &req.username),
        ("phone", &req.phone),
        ("email", &req.email),
        ("password", &req.password),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{name} is required")));
        }
    }

    if req.role != "employer" && req.role != "job_seeker" {
        return Err(AppError::Validation("Invalid role selected".to_string()));
    }

    if req.password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }

    let company_name = match req.role.as_str() {
        "employer" => match req.company_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            _ => {
                return Err(AppError::Validation(
                    "Company name is required for employers".to_string(),
                ))
            }
        },
        _ => None,
    };

    let existing: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE username = $1 OR email = $2")
            .bind(&req.username)
            .bind(&req.email)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "Username or email already exists".to_string(),
        ));
    }

    let user_id = Uuid::new_v4();
    let password_hash = hash_password(&req.password)?;

    sqlx::query(
        r#"
        INSERT INTO users
            (id, username, first_name, last_name, email, phone, gender, age,
             address, password_hash, role, company_name, is_verified)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, false)
        "#,
    )
    .bind(user_id)
    .bind(req.username.trim())
    .bind(req.first_name.trim())
    .bind(req.last_name.trim())
    .bind(req.email.trim())
    .bind(req.phone.trim())
    .bind(&req.gender)
    .bind(req.age)
    .bind(&req.address)
    .bind(&password_hash)
    .bind(&req.role)
    .bind(&company_name)
    .execute(&state.db)
    .await?;

    // Every account gets an empty extended profile row up front, so profile
    // updates are always plain UPDATEs against an existing row.
    sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    info!("new {} account created: {}", req.role, req.username);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            username: req.username.trim().to_string(),
            message: "Your account has been created. Please sign in to continue.".to_string(),
        }),
    ))
}

/// POST /api/v1/auth/signin
pub async fn handle_signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<SigninResponse>), AppError>
{
    let user: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE username = $1 OR email = $1")
            .bind(req.login.trim())
            .fetch_optional(&state.db)
            .await?;

    let user = match user {
        Some(u) if verify_password(&req.password, &u.password_hash) => u,
        // Same response whether the account or the password was wrong.
        _ => return Err(AppError::Unauthorized),
    };

    let data = SessionData {
        user_id: user.id,
        role: user.role(),
    };
    let ttl = Duration::from_secs(state.config.session_ttl_secs);
    let sid = create_session(state.sessions.as_ref(), &data, ttl).await?;

    info!("user {} signed in", user.username);

    let cookie = format!(
        "{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=None; Secure; Max-Age={}",
        ttl.as_secs()
    );

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(SigninResponse {
            user_id: user.id,
            role: user.role(),
        }),
    ))
}

/// POST /api/v1/auth/request-code
///
/// Issues a 6-digit one-time verification code with a short TTL. Delivery is
/// log-only until an outbound mail provider is wired in.
pub async fn handle_request_code(
    State(state): State<AppState>,
    Json(req): Json<RequestCodeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(req.email.trim())
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| AppError::NotFound("No account with that email".to_string()))?;

    let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32));
    put_verification_code(
        state.sessions.as_ref(),
        &user.email,
        &code,
        VERIFICATION_CODE_TTL,
    )
    .await?;

    info!("verification code for {}: {}", user.email, code);

    Ok(Json(MessageResponse {
        message: "Verification code sent".to_string(),
    }))
}

/// POST /api/v1/auth/verify
pub async fn handle_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = req.email.trim();
    let matched =
        redeem_verification_code(state.sessions.as_ref(), email, req.code.trim()).await?;
    if !matched {
        return Err(AppError::Validation(
            "Invalid or expired verification code".to_string(),
        ));
    }

    sqlx::query("UPDATE users SET is_verified = true WHERE email = $1")
        .bind(email)
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse {
        message: "Account verified".to_string(),
    }))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(
    auth: AuthSession,
    State(state): State<AppState>,
) -> Result<(AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<MessageResponse>), AppError>
{
    destroy_session(state.sessions.as_ref(), &auth.sid).await?;

    info!("user {} logged out", auth.user_id);

    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    ))
}
