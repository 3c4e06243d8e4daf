use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use sqlx::MySqlPool;

use super::groups_models::{AddMemberRequest, CreateGroupRequest, ListGroupsResponse};
use crate::auth;
use crate::models::group::Group;
use crate::routes::common::{clean, CreatedResponse, DefaultResponse};

pub async fn list_groups(pool: web::Data<MySqlPool>, req: HttpRequest) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    // Only live associations count as members
    let result = sqlx::query_as::<_, Group>(
        "SELECT g.group_id, g.group_name, g.description, g.owner_user_id, g.created_at,
                COUNT(a.association_id) AS member_count
         FROM Groups_ g
         LEFT JOIN GroupAssociationMapping_ gam ON gam.group_id = g.group_id
         LEFT JOIN Associations_ a ON a.association_id = gam.association_id AND a.is_deleted = FALSE
         GROUP BY g.group_id, g.group_name, g.description, g.owner_user_id, g.created_at
         ORDER BY g.group_name ASC",
    )
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListGroupsResponse { items }),
        Err(e) => {
            error!("Failed to fetch groups: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_group(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<CreateGroupRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let group_name = request.group_name.trim();
    if group_name.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("group_name is required"));
    }

    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM Groups_ WHERE group_name = ?")
        .bind(group_name)
        .fetch_one(pool.get_ref())
        .await
    {
        Ok(0) => {}
        Ok(_) => return HttpResponse::Conflict().json(DefaultResponse::fail("Group name already exists")),
        Err(e) => {
            error!("Failed to check group {}: {}", group_name, e);
            return HttpResponse::InternalServerError().finish();
        }
    }

    let result = sqlx::query("INSERT INTO Groups_ (group_name, description, owner_user_id) VALUES (?, ?, ?)")
        .bind(group_name)
        .bind(clean(&request.description))
        .bind(user.user_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) => {
            info!("User {} created group {}", user.user_name, group_name);
            HttpResponse::Ok().json(CreatedResponse {
                success: true,
                id: done.last_insert_id() as i64,
            })
        }
        Err(e) => {
            error!("Failed to create group {}: {}", group_name, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to create group"))
        }
    }
}

pub async fn add_member(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<AddMemberRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let group_id = path.into_inner();

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT (SELECT COUNT(*) FROM Groups_ WHERE group_id = ?)
              + (SELECT COUNT(*) FROM Associations_ WHERE association_id = ? AND is_deleted = FALSE)",
    )
    .bind(group_id)
    .bind(request.association_id)
    .fetch_one(pool.get_ref())
    .await;

    match exists {
        Ok(2) => {}
        Ok(_) => {
            return HttpResponse::NotFound().json(DefaultResponse::fail("Group or association not found"));
        }
        Err(e) => {
            error!("Failed to check group {} membership: {}", group_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    }

    let result =
        sqlx::query("INSERT IGNORE INTO GroupAssociationMapping_ (group_id, association_id) VALUES (?, ?)")
            .bind(group_id)
            .bind(request.association_id)
            .execute(pool.get_ref())
            .await;

    match result {
        Ok(_) => {
            info!("User {} added association {} to group {}", user.user_name, request.association_id, group_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Member added"))
        }
        Err(e) => {
            error!("Failed to add association {} to group {}: {}", request.association_id, group_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to add member"))
        }
    }
}

pub async fn remove_member(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let (group_id, association_id) = path.into_inner();

    let result = sqlx::query("DELETE FROM GroupAssociationMapping_ WHERE group_id = ? AND association_id = ?")
        .bind(group_id)
        .bind(association_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            HttpResponse::NotFound().json(DefaultResponse::fail("Association is not a member"))
        }
        Ok(_) => {
            info!("User {} removed association {} from group {}", user.user_name, association_id, group_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Member removed"))
        }
        Err(e) => {
            error!("Failed to remove association {} from group {}: {}", association_id, group_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to remove member"))
        }
    }
}
