//! `AuthSession` extractor — resolves the `sid` cookie through the injected
//! session store before any handler logic runs. Handlers that take an
//! `AuthSession` argument can never observe an unauthenticated caller.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::auth::session::load_session;
use crate::errors::AppError;
use crate::models::user::Role;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sid";

/// The authenticated caller for one request.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub sid: String,
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let sid = cookie_value(parts, SESSION_COOKIE).ok_or(AppError::Unauthorized)?;

        let data = load_session(state.sessions.as_ref(), &sid)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthSession {
            sid,
            user_id: data.user_id,
            role: data.role,
        })
    }
}

fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    let header = parts.headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{create_session, SessionData};
    use crate::state::test_support::test_state;
    use axum::http::Request;
    use std::time::Duration;

    fn parts_with_cookie(value: &str) -> Parts {
        let req = Request::builder()
            .header(COOKIE, value)
            .body(())
            .unwrap();
        req.into_parts().0
    }

    fn bare_parts() -> Parts {
        Request::builder().body(()).unwrap().into_parts().0
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let parts = parts_with_cookie("theme=dark; sid=abc-123; lang=en");
        assert_eq!(cookie_value(&parts, "sid").as_deref(), Some("abc-123"));
    }

    #[test]
    fn cookie_value_missing_is_none() {
        let parts = parts_with_cookie("theme=dark");
        assert!(cookie_value(&parts, "sid").is_none());
    }

    #[tokio::test]
    async fn missing_cookie_is_rejected_unauthorized() {
        let state = test_state();
        let mut parts = bare_parts();
        let rejection = AuthSession::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(rejection, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn unknown_sid_is_rejected_unauthorized() {
        let state = test_state();
        let mut parts = parts_with_cookie("sid=not-a-live-session");
        let rejection = AuthSession::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(rejection, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn live_session_resolves_caller() {
        let state = test_state();
        let data = SessionData {
            user_id: Uuid::new_v4(),
            role: Role::Employer,
        };
        let sid = create_session(state.sessions.as_ref(), &data, Duration::from_secs(60))
            .await
            .unwrap();

        let mut parts = parts_with_cookie(&format!("sid={sid}"));
        let auth = AuthSession::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(auth.user_id, data.user_id);
        assert_eq!(auth.role, Role::Employer);
        assert_eq!(auth.sid, sid);
    }
}
