use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use log::{error, info};
use sqlx::MySqlPool;
use uuid::Uuid;

use super::login_models::{
    LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse, SessionResponse,
};
use crate::auth::{self, SESSION_COOKIE};
use crate::config::Config;
use crate::models::user::User;

// register user to DB
pub async fn register(
    pool: web::Data<MySqlPool>,
    req: web::Json<RegisterRequest>,
) -> impl Responder {
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();
    info!("Received request to register user: {}", username);

    if username.is_empty() || email.is_empty() || req.password.len() < 8 {
        return HttpResponse::BadRequest().json(RegisterResponse {
            success: false,
            message: "Username, email and a password of at least 8 characters are required".into(),
        });
    }

    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM Users_ WHERE user_name = ? OR user_email = ?",
    )
    .bind(username)
    .bind(&email)
    .fetch_one(pool.get_ref())
    .await;

    match taken {
        Ok(0) => {}
        Ok(_) => {
            info!("Username or email already taken: {}", username);
            return HttpResponse::BadRequest().json(RegisterResponse {
                success: false,
                message: "Username or email already taken".into(),
            });
        }
        Err(e) => {
            error!("Failed to execute query: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    }

    // Encrypt password with bcrypt
    let hashed_password = match hash(&req.password, DEFAULT_COST) {
        Ok(hp) => hp,
        Err(e) => {
            error!("Failed to hash password: {}", e);
            return HttpResponse::InternalServerError().json(RegisterResponse {
                success: false,
                message: "Failed to hash password".into(),
            });
        }
    };

    // The first account bootstraps the admin role
    let role = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM Users_")
        .fetch_one(pool.get_ref())
        .await
    {
        Ok(0) => "ADMIN",
        Ok(_) => "USER",
        Err(e) => {
            error!("Failed to execute query: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result = sqlx::query("INSERT INTO Users_ (user_name, user_email, password_hash, user_role) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(&email)
        .bind(hashed_password)
        .bind(role)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            info!("User {} registered successfully", username);
            HttpResponse::Ok().json(RegisterResponse {
                success: true,
                message: "User registered successfully".into(),
            })
        }
        Err(e) => {
            error!("Failed to execute query: {}", e);
            HttpResponse::InternalServerError().json(RegisterResponse {
                success: false,
                message: "Failed to register user".into(),
            })
        }
    }
}

// login logic
pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    req: web::Json<LoginRequest>,
) -> impl Responder {
    let username = req.username.trim();
    info!("Received login request for user: {}", username);

    let unauthorized = |message: &str| {
        HttpResponse::Unauthorized().json(LoginResponse {
            success: false,
            message: message.into(),
            csrf_token: None,
        })
    };

    let user = match sqlx::query_as::<_, User>("SELECT * FROM Users_ WHERE user_name = ?")
        .bind(username)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid username: {}", username);
            return unauthorized("Invalid username or password");
        }
        Err(e) => {
            error!("Failed to fetch user {}: {}", username, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    match verify(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            info!("Invalid password for user: {}", username);
            return unauthorized("Invalid username or password");
        }
        Err(e) => {
            error!("Error when checking password for user {}: {}", username, e);
            return unauthorized("Error when checking password");
        }
    }

    let session_id = Uuid::new_v4().to_string();
    let csrf_token = Uuid::new_v4().to_string();
    let expires_at = if req.remember_me {
        Utc::now() + Duration::days(config.session_remember_days)
    } else {
        Utc::now() + Duration::minutes(config.session_ttl_minutes)
    };

    // One session per user; logging in again replaces the old one
    let upsert = sqlx::query(
        "INSERT INTO Sessions_ (session_id, user_id, csrf_token, expires_at, is_persistent)
         VALUES (?, ?, ?, ?, ?)
         ON DUPLICATE KEY UPDATE session_id = VALUES(session_id), csrf_token = VALUES(csrf_token),
             expires_at = VALUES(expires_at), is_persistent = VALUES(is_persistent)",
    )
    .bind(&session_id)
    .bind(user.user_id)
    .bind(&csrf_token)
    .bind(expires_at)
    .bind(req.remember_me)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = upsert {
        error!("Failed to create session for user {}: {}", username, e);
        return HttpResponse::InternalServerError().json(LoginResponse {
            success: false,
            message: "Failed to create session".into(),
            csrf_token: None,
        });
    }

    info!("User {} logged in successfully", username);
    HttpResponse::Ok()
        .cookie(
            Cookie::build(SESSION_COOKIE, session_id)
                .path("/")
                .http_only(true)
                .same_site(actix_web::cookie::SameSite::Lax)
                .finish(),
        )
        .json(LoginResponse {
            success: true,
            message: "Login successful".into(),
            csrf_token: Some(csrf_token),
        })
}

// Returns the logged-in user and the CSRF token the dashboard must echo
pub async fn session(pool: web::Data<MySqlPool>, req: HttpRequest) -> impl Responder {
    match auth::current_user(pool.get_ref(), &req).await {
        Ok(user) => HttpResponse::Ok().json(SessionResponse {
            success: true,
            username: user.user_name,
            role: user.user_role,
            csrf_token: user.csrf_token,
        }),
        Err(response) => response,
    }
}

pub async fn logout(pool: web::Data<MySqlPool>, req: HttpRequest) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let delete_result = sqlx::query("DELETE FROM Sessions_ WHERE user_id = ?")
        .bind(user.user_id)
        .execute(pool.get_ref())
        .await;

    match delete_result {
        Ok(_) => {
            info!("Logout successful for user: {}", user.user_name);
            let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
            removal.make_removal();
            HttpResponse::Ok().cookie(removal).json(LogoutResponse {
                success: true,
                message: "Logout successful".into(),
            })
        }
        Err(e) => {
            error!("Failed to delete session for user {}: {}", user.user_name, e);
            HttpResponse::InternalServerError().json(LogoutResponse {
                success: false,
                message: "Failed to logout".into(),
            })
        }
    }
}
