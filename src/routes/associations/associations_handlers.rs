use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::{error, info};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::associations_models::{
    order_by, AssociationDetailResponse, CreateAssociationRequest, ListAssociationsQuery,
    ListAssociationsResponse, UpdateAssociationRequest,
};
use crate::auth;
use crate::import::normalize::{normalize_email, normalize_phone, normalize_postal_code, normalize_url};
use crate::models::activity::Activity;
use crate::models::association::{Association, AssociationListItem};
use crate::models::contact::Contact;
use crate::models::description_section::DescriptionSection;
use crate::models::tag::Tag;
use crate::routes::common::{clean, paging, CreatedResponse, DefaultResponse};

const LIST_COLUMNS: &str = "a.association_id, a.name, a.municipality_id, a.municipality_name, a.source_system, \
     a.org_number, a.email, a.phone, a.city, a.homepage_url, a.updated_at";

fn push_filters(builder: &mut QueryBuilder<'_, MySql>, query: &ListAssociationsQuery) {
    builder.push(" WHERE a.is_deleted = FALSE");

    if let Some(q) = clean(&query.q) {
        let pattern = format!("%{}%", q);
        builder
            .push(" AND (a.name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.description_free_text LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(municipality) = clean(&query.municipality) {
        match municipality.parse::<i64>() {
            Ok(id) => {
                builder.push(" AND a.municipality_id = ").push_bind(id);
            }
            Err(_) => {
                builder.push(" AND a.municipality_name = ").push_bind(municipality);
            }
        }
    }

    if let Some(tag) = clean(&query.tag) {
        builder.push(
            " AND EXISTS (SELECT 1 FROM AssociationTagMapping_ atm JOIN Tags_ t ON t.tag_id = atm.tag_id \
             WHERE atm.association_id = a.association_id AND ",
        );
        match tag.parse::<i64>() {
            Ok(id) => {
                builder.push("t.tag_id = ").push_bind(id);
            }
            Err(_) => {
                builder.push("t.tag_name = ").push_bind(tag);
            }
        }
        builder.push(")");
    }
}

pub async fn list_associations(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<ListAssociationsQuery>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    let (page, page_size, offset) = paging(query.page, query.page_size, 20, 100);

    let mut count_builder: QueryBuilder<MySql> = QueryBuilder::new("SELECT COUNT(*) FROM Associations_ a");
    push_filters(&mut count_builder, &query);
    let total = match count_builder.build_query_scalar::<i64>().fetch_one(pool.get_ref()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Failed to count associations: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!("SELECT {} FROM Associations_ a", LIST_COLUMNS));
    push_filters(&mut builder, &query);
    builder
        .push(" ORDER BY ")
        .push(order_by(query.sort.as_deref()))
        .push(" LIMIT ")
        .push_bind(page_size)
        .push(" OFFSET ")
        .push_bind(offset);

    match builder.build_query_as::<AssociationListItem>().fetch_all(pool.get_ref()).await {
        Ok(items) => HttpResponse::Ok().json(ListAssociationsResponse {
            items,
            total,
            page,
            page_size,
        }),
        Err(e) => {
            error!("Failed to list associations: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn get_association(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }
    let association_id = path.into_inner();

    let association = match sqlx::query_as::<_, Association>(
        "SELECT * FROM Associations_ WHERE association_id = ? AND is_deleted = FALSE",
    )
    .bind(association_id)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(association)) => association,
        Ok(None) => {
            info!("Association not found: {}", association_id);
            return HttpResponse::NotFound().json(DefaultResponse::fail("Association not found"));
        }
        Err(e) => {
            error!("Failed to fetch association {}: {}", association_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let contacts = sqlx::query_as::<_, Contact>(
        "SELECT * FROM Contacts_ WHERE association_id = ? AND deleted_at IS NULL
         ORDER BY is_primary DESC, created_at ASC, contact_id ASC",
    )
    .bind(association_id)
    .fetch_all(pool.get_ref())
    .await;

    let tags = sqlx::query_as::<_, Tag>(
        "SELECT t.tag_id, t.tag_name, t.tag_color FROM Tags_ t
         JOIN AssociationTagMapping_ atm ON atm.tag_id = t.tag_id
         WHERE atm.association_id = ? ORDER BY t.tag_name ASC",
    )
    .bind(association_id)
    .fetch_all(pool.get_ref())
    .await;

    let sections = sqlx::query_as::<_, DescriptionSection>(
        "SELECT * FROM DescriptionSections_ WHERE association_id = ? ORDER BY order_index ASC",
    )
    .bind(association_id)
    .fetch_all(pool.get_ref())
    .await;

    match (contacts, tags, sections) {
        (Ok(contacts), Ok(tags), Ok(sections)) => HttpResponse::Ok().json(AssociationDetailResponse {
            association,
            contacts,
            tags,
            sections,
        }),
        (contacts, tags, sections) => {
            let message = [contacts.err(), tags.err(), sections.err()]
                .into_iter()
                .flatten()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            error!("Failed to load details for association {}: {}", association_id, message);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_association(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<CreateAssociationRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let name = request.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("name is required"));
    }

    let municipality_name = match sqlx::query_scalar::<_, String>(
        "SELECT name FROM Municipalities_ WHERE municipality_id = ?",
    )
    .bind(request.municipality_id)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(name)) => name,
        Ok(None) => {
            return HttpResponse::BadRequest().json(DefaultResponse::fail("Municipality not found"));
        }
        Err(e) => {
            error!("Failed to fetch municipality {}: {}", request.municipality_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let description = clean(&request.description);
    let types: Vec<String> = request
        .types
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to begin transaction: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let insert = sqlx::query(
        "INSERT INTO Associations_ (
            municipality_id, municipality_name, source_system, scraped_at, name, org_number, types,
            activities, categories, homepage_url, email, phone, street_address, postal_code, city,
            description, description_free_text
         ) VALUES (?, ?, 'manual', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(request.municipality_id)
    .bind(&municipality_name)
    .bind(Utc::now().naive_utc())
    .bind(name)
    .bind(clean(&request.org_number))
    .bind(Json(&types))
    .bind(Json(Vec::<String>::new()))
    .bind(Json(Vec::<String>::new()))
    .bind(normalize_url(request.homepage_url.as_deref()))
    .bind(normalize_email(request.email.as_deref()))
    .bind(normalize_phone(request.phone.as_deref()))
    .bind(clean(&request.street_address))
    .bind(normalize_postal_code(request.postal_code.as_deref()))
    .bind(clean(&request.city))
    .bind(description.as_ref().map(|d| Json(json!({ "free_text": d }))))
    .bind(&description)
    .execute(&mut *tx)
    .await;

    let association_id = match insert {
        Ok(result) => result.last_insert_id() as i64,
        Err(e) => {
            error!("Failed to create association {}: {}", name, e);
            return HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to create association"));
        }
    };

    let logged = Activity::record(&mut *tx, association_id, "CREATED", "Association created", &user.user_name).await;
    let committed = match logged {
        Ok(()) => tx.commit().await,
        Err(e) => Err(e),
    };

    match committed {
        Ok(()) => {
            info!("User {} created association {} ({})", user.user_name, name, association_id);
            HttpResponse::Ok().json(CreatedResponse {
                success: true,
                id: association_id,
            })
        }
        Err(e) => {
            error!("Failed to create association {}: {}", name, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to create association"))
        }
    }
}

pub async fn update_association(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateAssociationRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let association_id = path.into_inner();

    if request.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("No fields to update"));
    }
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return HttpResponse::BadRequest().json(DefaultResponse::fail("name must not be empty"));
        }
    }

    let mut builder: QueryBuilder<MySql> = QueryBuilder::new("UPDATE Associations_ SET ");
    let mut changed: Vec<&str> = Vec::new();
    {
        let mut set = builder.separated(", ");
        if let Some(name) = &request.name {
            set.push("name = ").push_bind_unseparated(name.trim().to_string());
            changed.push("name");
        }
        if request.org_number.is_some() {
            set.push("org_number = ").push_bind_unseparated(clean(&request.org_number));
            changed.push("org_number");
        }
        if request.email.is_some() {
            set.push("email = ").push_bind_unseparated(normalize_email(request.email.as_deref()));
            changed.push("email");
        }
        if request.phone.is_some() {
            set.push("phone = ").push_bind_unseparated(normalize_phone(request.phone.as_deref()));
            changed.push("phone");
        }
        if request.homepage_url.is_some() {
            set.push("homepage_url = ").push_bind_unseparated(normalize_url(request.homepage_url.as_deref()));
            changed.push("homepage_url");
        }
        if request.street_address.is_some() {
            set.push("street_address = ").push_bind_unseparated(clean(&request.street_address));
            changed.push("street_address");
        }
        if request.postal_code.is_some() {
            set.push("postal_code = ")
                .push_bind_unseparated(normalize_postal_code(request.postal_code.as_deref()));
            changed.push("postal_code");
        }
        if request.city.is_some() {
            set.push("city = ").push_bind_unseparated(clean(&request.city));
            changed.push("city");
        }
        if request.description.is_some() {
            let description = clean(&request.description);
            set.push("description = ")
                .push_bind_unseparated(description.as_ref().map(|d| Json(json!({ "free_text": d }))));
            set.push("description_free_text = ").push_bind_unseparated(description);
            changed.push("description");
        }
        if let Some(types) = &request.types {
            let types: Vec<String> = types
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            set.push("types = ").push_bind_unseparated(Json(types));
            changed.push("types");
        }
    }
    builder
        .push(" WHERE association_id = ")
        .push_bind(association_id)
        .push(" AND is_deleted = FALSE");

    let result = builder.build().execute(pool.get_ref()).await;
    match result {
        Ok(done) if done.rows_affected() == 0 => {
            HttpResponse::NotFound().json(DefaultResponse::fail("Association not found"))
        }
        Ok(_) => {
            let description = format!("Updated {}", changed.join(", "));
            if let Err(e) =
                Activity::record(pool.get_ref(), association_id, "UPDATED", &description, &user.user_name).await
            {
                error!("Failed to record activity for association {}: {}", association_id, e);
            }
            info!("User {} updated association {}", user.user_name, association_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Association updated"))
        }
        Err(e) => {
            error!("Failed to update association {}: {}", association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to update association"))
        }
    }
}

// Soft delete; the row stays for imports to revive
pub async fn delete_association(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let association_id = path.into_inner();

    let result = sqlx::query(
        "UPDATE Associations_ SET is_deleted = TRUE, deleted_at = ? WHERE association_id = ? AND is_deleted = FALSE",
    )
    .bind(Utc::now().naive_utc())
    .bind(association_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) if done.rows_affected() == 0 => {
            HttpResponse::NotFound().json(DefaultResponse::fail("Association not found"))
        }
        Ok(_) => {
            if let Err(e) =
                Activity::record(pool.get_ref(), association_id, "DELETED", "Association deleted", &user.user_name)
                    .await
            {
                error!("Failed to record activity for association {}: {}", association_id, e);
            }
            info!("User {} deleted association {}", user.user_name, association_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Association deleted"))
        }
        Err(e) => {
            error!("Failed to delete association {}: {}", association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to delete association"))
        }
    }
}
