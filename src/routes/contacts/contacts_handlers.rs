use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::{error, info};
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder};

use super::contacts_models::{
    AssociationContactsResponse, CreateContactRequest, ListContactsQuery, SearchContactsResponse,
    UpdateContactRequest,
};
use crate::auth;
use crate::import::normalize::{normalize_email, normalize_phone};
use crate::models::activity::Activity;
use crate::models::contact::{Contact, ContactWithAssociation};
use crate::routes::common::{clean, paging, CreatedResponse, DefaultResponse};

async fn clear_other_primaries(
    conn: &mut MySqlConnection,
    association_id: i64,
    keep_contact_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE Contacts_ SET is_primary = FALSE
         WHERE association_id = ? AND contact_id <> ? AND deleted_at IS NULL AND is_primary = TRUE",
    )
    .bind(association_id)
    .bind(keep_contact_id)
    .execute(conn)
    .await?;
    Ok(())
}

// Returns the promoted contact, if any live contact is left
async fn promote_oldest(conn: &mut MySqlConnection, association_id: i64) -> Result<Option<i64>, sqlx::Error> {
    let next = sqlx::query_scalar::<_, i64>(
        "SELECT contact_id FROM Contacts_ WHERE association_id = ? AND deleted_at IS NULL
         ORDER BY created_at ASC, contact_id ASC LIMIT 1",
    )
    .bind(association_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(contact_id) = next {
        sqlx::query("UPDATE Contacts_ SET is_primary = TRUE WHERE contact_id = ?")
            .bind(contact_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(next)
}

fn push_search_filters(builder: &mut QueryBuilder<'_, MySql>, pattern: Option<&str>) {
    builder.push(" WHERE c.deleted_at IS NULL AND a.is_deleted = FALSE");
    if let Some(pattern) = pattern {
        builder.push(" AND (");
        let mut any = builder.separated(" OR ");
        for column in ["c.name", "c.email", "c.phone", "a.name"] {
            any.push(column).push_unseparated(" LIKE ").push_bind_unseparated(pattern.to_string());
        }
        builder.push(")");
    }
}

pub async fn list_contacts(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<ListContactsQuery>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    if let Some(association_id) = query.association_id {
        let result = sqlx::query_as::<_, Contact>(
            "SELECT * FROM Contacts_ WHERE association_id = ? AND deleted_at IS NULL
             ORDER BY is_primary DESC, created_at ASC, contact_id ASC",
        )
        .bind(association_id)
        .fetch_all(pool.get_ref())
        .await;

        return match result {
            Ok(items) => HttpResponse::Ok().json(AssociationContactsResponse { items }),
            Err(e) => {
                error!("Failed to fetch contacts for association {}: {}", association_id, e);
                HttpResponse::InternalServerError().finish()
            }
        };
    }

    let (page, page_size, offset) = paging(query.page, query.page_size, 50, 500);
    let pattern = clean(&query.q).map(|q| format!("%{}%", q));

    let mut count_builder: QueryBuilder<MySql> = QueryBuilder::new(
        "SELECT COUNT(*) FROM Contacts_ c JOIN Associations_ a ON a.association_id = c.association_id",
    );
    push_search_filters(&mut count_builder, pattern.as_deref());
    let total = match count_builder.build_query_scalar::<i64>().fetch_one(pool.get_ref()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Failed to count contacts: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
        "SELECT c.contact_id, c.association_id, c.name, c.role, c.email, c.phone, c.mobile, c.is_primary,
                a.name AS association_name, a.municipality_name
         FROM Contacts_ c JOIN Associations_ a ON a.association_id = c.association_id",
    );
    push_search_filters(&mut builder, pattern.as_deref());
    builder
        .push(" ORDER BY c.name ASC, c.contact_id ASC LIMIT ")
        .push_bind(page_size)
        .push(" OFFSET ")
        .push_bind(offset);

    match builder.build_query_as::<ContactWithAssociation>().fetch_all(pool.get_ref()).await {
        Ok(items) => HttpResponse::Ok().json(SearchContactsResponse {
            items,
            total,
            page,
            page_size,
        }),
        Err(e) => {
            error!("Failed to search contacts: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_contact(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<CreateContactRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let name = request.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("name is required"));
    }

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

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to begin transaction: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result: Result<i64, sqlx::Error> = async {
        // The first live contact of an association is always primary
        let live = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM Contacts_ WHERE association_id = ? AND deleted_at IS NULL",
        )
        .bind(request.association_id)
        .fetch_one(&mut *tx)
        .await?;
        let is_primary = request.is_primary || live == 0;

        let contact_id = sqlx::query(
            "INSERT INTO Contacts_ (association_id, name, role, email, phone, mobile, is_primary)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.association_id)
        .bind(name)
        .bind(clean(&request.role))
        .bind(normalize_email(request.email.as_deref()))
        .bind(normalize_phone(request.phone.as_deref()))
        .bind(normalize_phone(request.mobile.as_deref()))
        .bind(is_primary)
        .execute(&mut *tx)
        .await?
        .last_insert_id() as i64;

        if is_primary {
            clear_other_primaries(&mut *tx, request.association_id, contact_id).await?;
        }
        Activity::record(
            &mut *tx,
            request.association_id,
            "CONTACT_ADDED",
            &format!("Contact {} added", name),
            &user.user_name,
        )
        .await?;
        Ok(contact_id)
    }
    .await;

    let result = match result {
        Ok(contact_id) => tx.commit().await.map(|_| contact_id),
        Err(e) => Err(e),
    };

    match result {
        Ok(contact_id) => {
            info!("User {} added contact {} to association {}", user.user_name, contact_id, request.association_id);
            HttpResponse::Ok().json(CreatedResponse {
                success: true,
                id: contact_id,
            })
        }
        Err(e) => {
            error!("Failed to create contact for association {}: {}", request.association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to create contact"))
        }
    }
}

pub async fn update_contact(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateContactRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let contact_id = path.into_inner();

    if request.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("No fields to update"));
    }
    if let Some(name) = &request.name {
        if name.trim().is_empty() {
            return HttpResponse::BadRequest().json(DefaultResponse::fail("name must not be empty"));
        }
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to begin transaction: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let existing = sqlx::query_as::<_, Contact>(
        "SELECT * FROM Contacts_ WHERE contact_id = ? AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(contact_id)
    .fetch_optional(&mut *tx)
    .await;

    let existing = match existing {
        Ok(Some(contact)) => contact,
        Ok(None) => return HttpResponse::NotFound().json(DefaultResponse::fail("Contact not found")),
        Err(e) => {
            error!("Failed to fetch contact {}: {}", contact_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result: Result<(), sqlx::Error> = async {
        let mut builder: QueryBuilder<MySql> = QueryBuilder::new("UPDATE Contacts_ SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(name) = &request.name {
                set.push("name = ").push_bind_unseparated(name.trim().to_string());
            }
            if request.role.is_some() {
                set.push("role = ").push_bind_unseparated(clean(&request.role));
            }
            if request.email.is_some() {
                set.push("email = ").push_bind_unseparated(normalize_email(request.email.as_deref()));
            }
            if request.phone.is_some() {
                set.push("phone = ").push_bind_unseparated(normalize_phone(request.phone.as_deref()));
            }
            if request.mobile.is_some() {
                set.push("mobile = ").push_bind_unseparated(normalize_phone(request.mobile.as_deref()));
            }
            if let Some(is_primary) = request.is_primary {
                set.push("is_primary = ").push_bind_unseparated(is_primary);
            }
        }
        builder.push(" WHERE contact_id = ").push_bind(contact_id);
        builder.build().execute(&mut *tx).await?;

        match request.is_primary {
            Some(true) => clear_other_primaries(&mut *tx, existing.association_id, contact_id).await?,
            Some(false) if existing.is_primary => {
                // Unsetting the primary hands the role to the oldest live contact
                let other = sqlx::query_scalar::<_, i64>(
                    "SELECT contact_id FROM Contacts_
                     WHERE association_id = ? AND contact_id <> ? AND deleted_at IS NULL
                     ORDER BY created_at ASC, contact_id ASC LIMIT 1",
                )
                .bind(existing.association_id)
                .bind(contact_id)
                .fetch_optional(&mut *tx)
                .await?;
                if let Some(other) = other {
                    sqlx::query("UPDATE Contacts_ SET is_primary = TRUE WHERE contact_id = ?")
                        .bind(other)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            _ => {}
        }

        Activity::record(
            &mut *tx,
            existing.association_id,
            "CONTACT_UPDATED",
            &format!("Contact {} updated", existing.name),
            &user.user_name,
        )
        .await?;
        Ok(())
    }
    .await;

    let result = match result {
        Ok(()) => tx.commit().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!("User {} updated contact {}", user.user_name, contact_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Contact updated"))
        }
        Err(e) => {
            error!("Failed to update contact {}: {}", contact_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to update contact"))
        }
    }
}

pub async fn delete_contact(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let contact_id = path.into_inner();

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to begin transaction: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let existing = sqlx::query_as::<_, Contact>(
        "SELECT * FROM Contacts_ WHERE contact_id = ? AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(contact_id)
    .fetch_optional(&mut *tx)
    .await;

    let existing = match existing {
        Ok(Some(contact)) => contact,
        Ok(None) => return HttpResponse::NotFound().json(DefaultResponse::fail("Contact not found")),
        Err(e) => {
            error!("Failed to fetch contact {}: {}", contact_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result: Result<Option<i64>, sqlx::Error> = async {
        sqlx::query("UPDATE Contacts_ SET deleted_at = ?, is_primary = FALSE WHERE contact_id = ?")
            .bind(Utc::now().naive_utc())
            .bind(contact_id)
            .execute(&mut *tx)
            .await?;

        let promoted = if existing.is_primary {
            promote_oldest(&mut *tx, existing.association_id).await?
        } else {
            None
        };

        Activity::record(
            &mut *tx,
            existing.association_id,
            "CONTACT_DELETED",
            &format!("Contact {} deleted", existing.name),
            &user.user_name,
        )
        .await?;
        Ok(promoted)
    }
    .await;

    let result = match result {
        Ok(promoted) => tx.commit().await.map(|_| promoted),
        Err(e) => Err(e),
    };

    match result {
        Ok(promoted) => {
            if let Some(promoted) = promoted {
                info!("Contact {} is now primary for association {}", promoted, existing.association_id);
            }
            info!("User {} deleted contact {}", user.user_name, contact_id);
            HttpResponse::Ok().json(DefaultResponse::ok("Contact deleted"))
        }
        Err(e) => {
            error!("Failed to delete contact {}: {}", contact_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to delete contact"))
        }
    }
}
