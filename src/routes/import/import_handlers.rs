use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info, warn};
use sqlx::MySqlPool;

use super::import_models::{ImportErrorResponse, ImportFilePayload, ImportRequest};
use crate::auth;
use crate::config::Config;
use crate::import::{
    check_import_file, import_associations, parse_import_file, ImportError, ImportMode, ImportOptions,
};

const IMPORT_ROLES: &[&str] = &["ADMIN", "MANAGER"];

fn import_error_response(e: &ImportError) -> HttpResponse {
    if e.is_client_error() {
        warn!("Rejected import: {}", e);
        HttpResponse::BadRequest().json(ImportErrorResponse::new(e.to_string()))
    } else {
        error!("Import failed: {}", e);
        HttpResponse::InternalServerError().json(ImportErrorResponse::new("Import failed"))
    }
}

pub async fn import(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    req: HttpRequest,
    request: web::Json<ImportRequest>,
) -> impl Responder {
    let user = match auth::require_role(pool.get_ref(), &req, IMPORT_ROLES).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let mode = match request.mode.as_deref() {
        None => ImportMode::default(),
        Some(raw) => match raw.parse::<ImportMode>() {
            Ok(mode) => mode,
            Err(message) => return HttpResponse::BadRequest().json(ImportErrorResponse::new(message)),
        },
    };

    let mut files = Vec::with_capacity(request.files.len());
    for ImportFilePayload { name, content } in &request.files {
        match parse_import_file(name, content) {
            Ok(file) => files.push(file),
            Err(e) => return import_error_response(&e),
        }
    }

    let options = ImportOptions {
        mode,
        municipality_id: request.municipality_id,
        remove_missing: request.remove_missing.unwrap_or(config.remove_on_update),
        create_missing_municipality: request.create_municipality.unwrap_or(true),
        actor_id: user.user_id.to_string(),
        actor_name: user.user_name.clone(),
        ..ImportOptions::default()
    };

    match import_associations(pool.get_ref(), &files, &options).await {
        Ok(result) => {
            info!(
                "User {} imported {} file(s) into {}: {} imported, {} updated, {} errors",
                user.user_name,
                files.len(),
                result.municipality_name,
                result.counters.imported_count,
                result.counters.updated_count,
                result.counters.error_count
            );
            HttpResponse::Ok().json(result)
        }
        Err(e) => import_error_response(&e),
    }
}

pub async fn check(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<ImportFilePayload>,
) -> impl Responder {
    if let Err(response) = auth::require_role(pool.get_ref(), &req, IMPORT_ROLES).await {
        return response;
    }

    let file = match parse_import_file(&request.name, &request.content) {
        Ok(file) => file,
        Err(e) => return import_error_response(&e),
    };

    match check_import_file(pool.get_ref(), &file).await {
        Ok(check) => HttpResponse::Ok().json(check),
        Err(e) => import_error_response(&e),
    }
}
