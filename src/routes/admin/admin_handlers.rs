use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use sqlx::MySqlPool;

use super::admin_models::{ListUsersResponse, UpdateRoleRequest};
use crate::auth;
use crate::models::user::User;
use crate::routes::common::DefaultResponse;

const ADMIN: &[&str] = &["ADMIN"];

pub async fn session_reset(pool: web::Data<MySqlPool>, req: HttpRequest) -> impl Responder {
    let user = match auth::require_role(pool.get_ref(), &req, ADMIN).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let result = sqlx::query("DELETE FROM Sessions_").execute(pool.get_ref()).await;

    match result {
        Ok(done) => {
            info!("User {} reset {} session(s)", user.user_name, done.rows_affected());
            HttpResponse::Ok().json(DefaultResponse::ok("All sessions have been reset successfully"))
        }
        Err(e) => {
            error!("Failed to reset sessions: {}", e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to reset sessions"))
        }
    }
}

pub async fn list_users(pool: web::Data<MySqlPool>, req: HttpRequest) -> impl Responder {
    if let Err(response) = auth::require_role(pool.get_ref(), &req, ADMIN).await {
        return response;
    }

    match sqlx::query_as::<_, User>("SELECT * FROM Users_ ORDER BY user_name ASC")
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(items) => HttpResponse::Ok().json(ListUsersResponse { items }),
        Err(e) => {
            error!("Failed to fetch users: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn update_role(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateRoleRequest>,
) -> impl Responder {
    let admin = match auth::require_role(pool.get_ref(), &req, ADMIN).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let user_id = path.into_inner();

    let role = match request.normalized_role() {
        Some(role) => role,
        None => return HttpResponse::BadRequest().json(DefaultResponse::fail("Unknown role")),
    };
    if user_id == admin.user_id && role != "ADMIN" {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("Admins cannot demote themselves"));
    }

    let result = sqlx::query("UPDATE Users_ SET user_role = ? WHERE user_id = ?")
        .bind(role)
        .bind(user_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            HttpResponse::NotFound().json(DefaultResponse::fail("User not found"))
        }
        Ok(_) => {
            info!("User {} set role of user {} to {}", admin.user_name, user_id, role);
            HttpResponse::Ok().json(DefaultResponse::ok("Role updated"))
        }
        Err(e) => {
            error!("Failed to update role of user {}: {}", user_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to update role"))
        }
    }
}
