use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use sqlx::MySqlPool;

use super::municipalities_models::{ListImportBatchesResponse, ListMunicipalitiesResponse, ListScrapeRunsResponse};
use crate::auth;
use crate::models::import_batch::ImportBatch;
use crate::models::municipality::{Municipality, MunicipalitySummary};
use crate::models::scrape_run::ScrapeRun;
use crate::routes::common::DefaultResponse;

pub async fn list_municipalities(pool: web::Data<MySqlPool>, req: HttpRequest) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    let result = sqlx::query_as::<_, MunicipalitySummary>(
        "SELECT m.municipality_id, m.name, m.code, m.platform, COUNT(a.association_id) AS association_count
         FROM Municipalities_ m
         LEFT JOIN Associations_ a ON a.municipality_id = m.municipality_id AND a.is_deleted = FALSE
         GROUP BY m.municipality_id, m.name, m.code, m.platform
         ORDER BY m.name ASC",
    )
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListMunicipalitiesResponse { items }),
        Err(e) => {
            error!("Failed to fetch municipalities: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn get_municipality(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }
    let municipality_id = path.into_inner();

    match sqlx::query_as::<_, Municipality>("SELECT * FROM Municipalities_ WHERE municipality_id = ?")
        .bind(municipality_id)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(municipality)) => HttpResponse::Ok().json(municipality),
        Ok(None) => {
            info!("Municipality not found: {}", municipality_id);
            HttpResponse::NotFound().json(DefaultResponse::fail("Municipality not found"))
        }
        Err(e) => {
            error!("Failed to fetch municipality {}: {}", municipality_id, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn list_scrape_runs(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }
    let municipality_id = path.into_inner();

    let result = sqlx::query_as::<_, ScrapeRun>(
        "SELECT * FROM ScrapeRuns_ WHERE municipality_id = ? ORDER BY started_at DESC LIMIT 50",
    )
    .bind(municipality_id)
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListScrapeRunsResponse { items }),
        Err(e) => {
            error!("Failed to fetch scrape runs for municipality {}: {}", municipality_id, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn list_import_batches(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }
    let municipality_id = path.into_inner();

    let result = sqlx::query_as::<_, ImportBatch>(
        "SELECT * FROM ImportBatches_ WHERE municipality_id = ? ORDER BY created_at DESC, import_batch_id DESC LIMIT 50",
    )
    .bind(municipality_id)
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListImportBatchesResponse { items }),
        Err(e) => {
            error!("Failed to fetch import batches for municipality {}: {}", municipality_id, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
