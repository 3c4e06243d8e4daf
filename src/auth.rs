use actix_web::{HttpRequest, HttpResponse};
use log::{error, info};
use serde::Serialize;
use sqlx::MySqlPool;

use crate::models::session::Session;

pub const SESSION_COOKIE: &str = "session_id";
pub const CSRF_HEADER: &str = "X-CSRF-Token";

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: i64,
    pub user_name: String,
    pub user_role: String,
    pub csrf_token: String,
}

impl CurrentUser {
    pub fn has_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| role.eq_ignore_ascii_case(&self.user_role))
    }
}

#[derive(Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub message: String,
}

fn reject(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(AuthErrorResponse {
        success: false,
        message: message.into(),
    })
}

// Resolve the logged-in user from the session cookie
pub async fn current_user(pool: &MySqlPool, req: &HttpRequest) -> Result<CurrentUser, HttpResponse> {
    use actix_web::http::StatusCode;

    let session_id = match req.cookie(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => {
            info!("Session ID not found in cookies for {}", req.path());
            return Err(reject(StatusCode::UNAUTHORIZED, "Session ID not found"));
        }
    };

    let session = match sqlx::query_as::<_, Session>("SELECT * FROM Sessions_ WHERE session_id = ?")
        .bind(&session_id)
        .fetch_optional(pool)
        .await
    {
        Ok(Some(session)) => session,
        Ok(None) => {
            info!("Invalid session ID: {}", session_id);
            return Err(reject(StatusCode::UNAUTHORIZED, "Invalid or expired session"));
        }
        Err(e) => {
            error!("Failed to validate session ID {}: {}", session_id, e);
            return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to check session"));
        }
    };

    if session.is_expired() {
        info!("Session expired for user {}", session.user_id);
        if let Err(e) = sqlx::query("DELETE FROM Sessions_ WHERE session_id = ?")
            .bind(&session.session_id)
            .execute(pool)
            .await
        {
            error!("Failed to delete expired session {}: {}", session.session_id, e);
        }
        return Err(reject(StatusCode::UNAUTHORIZED, "Invalid or expired session"));
    }

    let user = sqlx::query_as::<_, (String, String)>("SELECT user_name, user_role FROM Users_ WHERE user_id = ?")
        .bind(session.user_id)
        .fetch_optional(pool)
        .await;

    match user {
        Ok(Some((user_name, user_role))) => Ok(CurrentUser {
            user_id: session.user_id,
            user_name,
            user_role,
            csrf_token: session.csrf_token,
        }),
        Ok(None) => Err(reject(StatusCode::UNAUTHORIZED, "Invalid or expired session")),
        Err(e) => {
            error!("Failed to fetch user {}: {}", session.user_id, e);
            Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to check session"))
        }
    }
}

// Write operations additionally need the session's CSRF token echoed in a header
pub async fn require_write(pool: &MySqlPool, req: &HttpRequest) -> Result<CurrentUser, HttpResponse> {
    let user = current_user(pool, req).await?;
    if !csrf_matches(req, &user.csrf_token) {
        info!("CSRF token mismatch for user {}", user.user_name);
        return Err(reject(actix_web::http::StatusCode::FORBIDDEN, "Invalid CSRF token"));
    }
    Ok(user)
}

pub async fn require_role(
    pool: &MySqlPool,
    req: &HttpRequest,
    roles: &[&str],
) -> Result<CurrentUser, HttpResponse> {
    let user = require_write(pool, req).await?;
    if !user.has_role(roles) {
        info!("User {} lacks role {:?}", user.user_name, roles);
        return Err(reject(actix_web::http::StatusCode::FORBIDDEN, "Insufficient permissions"));
    }
    Ok(user)
}

pub fn csrf_matches(req: &HttpRequest, expected: &str) -> bool {
    req.headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| !expected.is_empty() && value == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn csrf_header_must_match_exactly() {
        let req = TestRequest::default()
            .insert_header((CSRF_HEADER, "abc"))
            .to_http_request();
        assert!(csrf_matches(&req, "abc"));
        assert!(!csrf_matches(&req, "abd"));
        assert!(!csrf_matches(&TestRequest::default().to_http_request(), "abc"));
    }

    #[test]
    fn empty_token_never_matches() {
        let req = TestRequest::default()
            .insert_header((CSRF_HEADER, ""))
            .to_http_request();
        assert!(!csrf_matches(&req, ""));
    }

    #[test]
    fn roles_compare_case_insensitively() {
        let user = CurrentUser {
            user_id: 1,
            user_name: "anna".into(),
            user_role: "admin".into(),
            csrf_token: "t".into(),
        };
        assert!(user.has_role(&["ADMIN", "MANAGER"]));
        assert!(!user.has_role(&["MANAGER"]));
    }
}
