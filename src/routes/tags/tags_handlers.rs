use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use sqlx::MySqlPool;

use super::tags_models::{CreateTagRequest, ListTagsQuery, ListTagsResponse, TagAssignmentRequest};
use crate::auth;
use crate::models::activity::Activity;
use crate::models::tag::Tag;
use crate::routes::common::{clean, CreatedResponse, DefaultResponse};

pub async fn list_tags(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<ListTagsQuery>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    let result = match query.association_id {
        Some(association_id) => {
            sqlx::query_as::<_, Tag>(
                "SELECT t.tag_id, t.tag_name, t.tag_color FROM Tags_ t
                 JOIN AssociationTagMapping_ atm ON atm.tag_id = t.tag_id
                 WHERE atm.association_id = ? ORDER BY t.tag_name ASC",
            )
            .bind(association_id)
            .fetch_all(pool.get_ref())
            .await
        }
        None => {
            sqlx::query_as::<_, Tag>("SELECT tag_id, tag_name, tag_color FROM Tags_ ORDER BY tag_name ASC")
                .fetch_all(pool.get_ref())
                .await
        }
    };

    match result {
        Ok(items) => HttpResponse::Ok().json(ListTagsResponse { items }),
        Err(e) => {
            error!("Failed to fetch tags: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_tag(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<CreateTagRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let tag_name = request.tag_name.trim();
    if tag_name.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("tag_name is required"));
    }

    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM Tags_ WHERE tag_name = ?")
        .bind(tag_name)
        .fetch_one(pool.get_ref())
        .await
    {
        Ok(0) => {}
        Ok(_) => return HttpResponse::Conflict().json(DefaultResponse::fail("Tag already exists")),
        Err(e) => {
            error!("Failed to check tag {}: {}", tag_name, e);
            return HttpResponse::InternalServerError().finish();
        }
    }

    let result = sqlx::query("INSERT INTO Tags_ (tag_name, tag_color) VALUES (?, ?)")
        .bind(tag_name)
        .bind(clean(&request.tag_color))
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) => {
            info!("User {} created tag {}", user.user_name, tag_name);
            HttpResponse::Ok().json(CreatedResponse {
                success: true,
                id: done.last_insert_id() as i64,
            })
        }
        Err(e) => {
            error!("Failed to create tag {}: {}", tag_name, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to create tag"))
        }
    }
}

pub async fn attach_tag(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<TagAssignmentRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let tag_name = match sqlx::query_scalar::<_, String>("SELECT tag_name FROM Tags_ WHERE tag_id = ?")
        .bind(request.tag_id)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(name)) => name,
        Ok(None) => return HttpResponse::NotFound().json(DefaultResponse::fail("Tag not found")),
        Err(e) => {
            error!("Failed to fetch tag {}: {}", request.tag_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    match sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM Associations_ WHERE association_id = ? AND is_deleted = FALSE",
    )
    .bind(request.association_id)
    .fetch_one(pool.get_ref())
    .await
    {
        Ok(0) => return HttpResponse::NotFound().json(DefaultResponse::fail("Association not found")),
        Ok(_) => {}
        Err(e) => {
            error!("Failed to check association {}: {}", request.association_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    }

    // Already attached is a no-op
    let result = sqlx::query("INSERT IGNORE INTO AssociationTagMapping_ (association_id, tag_id) VALUES (?, ?)")
        .bind(request.association_id)
        .bind(request.tag_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) => {
            if done.rows_affected() > 0 {
                let description = format!("Tag {} attached", tag_name);
                if let Err(e) =
                    Activity::record(pool.get_ref(), request.association_id, "TAG_ADDED", &description, &user.user_name)
                        .await
                {
                    error!("Failed to record activity for association {}: {}", request.association_id, e);
                }
            }
            HttpResponse::Ok().json(DefaultResponse::ok("Tag attached"))
        }
        Err(e) => {
            error!("Failed to attach tag {} to {}: {}", request.tag_id, request.association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to attach tag"))
        }
    }
}

pub async fn detach_tag(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<TagAssignmentRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let result = sqlx::query("DELETE FROM AssociationTagMapping_ WHERE association_id = ? AND tag_id = ?")
        .bind(request.association_id)
        .bind(request.tag_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            HttpResponse::NotFound().json(DefaultResponse::fail("Tag is not attached"))
        }
        Ok(_) => {
            let description = format!("Tag {} detached", request.tag_id);
            if let Err(e) =
                Activity::record(pool.get_ref(), request.association_id, "TAG_REMOVED", &description, &user.user_name)
                    .await
            {
                error!("Failed to record activity for association {}: {}", request.association_id, e);
            }
            HttpResponse::Ok().json(DefaultResponse::ok("Tag detached"))
        }
        Err(e) => {
            error!("Failed to detach tag {} from {}: {}", request.tag_id, request.association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to detach tag"))
        }
    }
}
