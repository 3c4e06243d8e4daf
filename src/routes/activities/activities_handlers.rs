use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::error;
use sqlx::MySqlPool;

use super::activities_models::ListActivitiesResponse;
use crate::auth;
use crate::models::activity::Activity;
use crate::routes::common::AssociationScope;

pub async fn list_activities(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<AssociationScope>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    let result = sqlx::query_as::<_, Activity>(
        "SELECT * FROM Activities_ WHERE association_id = ? ORDER BY created_at DESC, activity_id DESC",
    )
    .bind(query.association_id)
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListActivitiesResponse { items }),
        Err(e) => {
            error!("Failed to fetch activities for association {}: {}", query.association_id, e);
            HttpResponse::InternalServerError().json(ListActivitiesResponse { items: Vec::new() })
        }
    }
}
