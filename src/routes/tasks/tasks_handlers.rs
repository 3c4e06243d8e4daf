use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::{error, info};
use sqlx::MySqlPool;

use super::tasks_models::{CreateTaskRequest, ListTasksResponse};
use crate::auth;
use crate::models::activity::Activity;
use crate::models::task::Task;
use crate::routes::common::{clean, AssociationScope, CreatedResponse, DefaultResponse};

pub async fn list_tasks(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<AssociationScope>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    // Open tasks first, soonest due first
    let result = sqlx::query_as::<_, Task>(
        "SELECT * FROM Tasks_ WHERE association_id = ?
         ORDER BY is_completed ASC, due_date IS NULL, due_date ASC, created_at DESC",
    )
    .bind(query.association_id)
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListTasksResponse { items }),
        Err(e) => {
            error!("Failed to fetch tasks for association {}: {}", query.association_id, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_task(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<CreateTaskRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let title = request.title.trim();
    if title.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("title is required"));
    }

    let result = sqlx::query(
        "INSERT INTO Tasks_ (association_id, title, description, due_date, created_by) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(request.association_id)
    .bind(title)
    .bind(clean(&request.description))
    .bind(request.due_date)
    .bind(&user.user_name)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            let task_id = done.last_insert_id() as i64;
            let description = format!("Task created: {}", title);
            if let Err(e) =
                Activity::record(pool.get_ref(), request.association_id, "TASK_CREATED", &description, &user.user_name)
                    .await
            {
                error!("Failed to record activity for association {}: {}", request.association_id, e);
            }
            info!("User {} created task {}", user.user_name, task_id);
            HttpResponse::Ok().json(CreatedResponse {
                success: true,
                id: task_id,
            })
        }
        Err(e) => {
            error!("Failed to create task for association {}: {}", request.association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to create task"))
        }
    }
}

pub async fn complete_task(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let task_id = path.into_inner();

    let task = match sqlx::query_as::<_, Task>("SELECT * FROM Tasks_ WHERE task_id = ?")
        .bind(task_id)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(task)) => task,
        Ok(None) => return HttpResponse::NotFound().json(DefaultResponse::fail("Task not found")),
        Err(e) => {
            error!("Failed to fetch task {}: {}", task_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    if task.is_completed {
        return HttpResponse::Ok().json(DefaultResponse::ok("Task already completed"));
    }

    let result = sqlx::query("UPDATE Tasks_ SET is_completed = TRUE, completed_at = ? WHERE task_id = ?")
        .bind(Utc::now().naive_utc())
        .bind(task_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            let description = format!("Task completed: {}", task.title);
            if let Err(e) =
                Activity::record(pool.get_ref(), task.association_id, "TASK_COMPLETED", &description, &user.user_name)
                    .await
            {
                error!("Failed to record activity for association {}: {}", task.association_id, e);
            }
            info!("User {} completed task {}", user.user_name, task_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Task completed"))
        }
        Err(e) => {
            error!("Failed to complete task {}: {}", task_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to complete task"))
        }
    }
}
