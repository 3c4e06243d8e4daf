use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use sqlx::MySqlPool;

use super::notes_models::{CreateNoteRequest, ListNotesResponse};
use crate::auth;
use crate::models::activity::Activity;
use crate::models::note::Note;
use crate::routes::common::{AssociationScope, CreatedResponse, DefaultResponse};

pub async fn list_notes(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    query: web::Query<AssociationScope>,
) -> impl Responder {
    if let Err(response) = auth::current_user(pool.get_ref(), &req).await {
        return response;
    }

    let result = sqlx::query_as::<_, Note>(
        "SELECT * FROM Notes_ WHERE association_id = ? ORDER BY created_at DESC, note_id DESC",
    )
    .bind(query.association_id)
    .fetch_all(pool.get_ref())
    .await;

    match result {
        Ok(items) => HttpResponse::Ok().json(ListNotesResponse { items }),
        Err(e) => {
            error!("Failed to fetch notes for association {}: {}", query.association_id, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn create_note(
    pool: web::Data<MySqlPool>,
    req: HttpRequest,
    request: web::Json<CreateNoteRequest>,
) -> impl Responder {
    let user = match auth::require_write(pool.get_ref(), &req).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let content = request.content.trim();
    if content.is_empty() {
        return HttpResponse::BadRequest().json(DefaultResponse::fail("content is required"));
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            error!("Failed to begin transaction: {}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result: Result<i64, sqlx::Error> = async {
        let note_id = sqlx::query("INSERT INTO Notes_ (association_id, content, author) VALUES (?, ?, ?)")
            .bind(request.association_id)
            .bind(content)
            .bind(&user.user_name)
            .execute(&mut *tx)
            .await?
            .last_insert_id() as i64;
        Activity::record(&mut *tx, request.association_id, "NOTE_ADDED", "Note added", &user.user_name).await?;
        Ok(note_id)
    }
    .await;

    let result = match result {
        Ok(note_id) => tx.commit().await.map(|_| note_id),
        Err(e) => Err(e),
    };

    match result {
        Ok(note_id) => {
            info!("User {} added note {} to association {}", user.user_name, note_id, request.association_id);
            HttpResponse::Ok().json(CreatedResponse {
                success: true,
                id: note_id,
            })
        }
        Err(e) => {
            error!("Failed to add note to association {}: {}", request.association_id, e);
            HttpResponse::InternalServerError().json(DefaultResponse::fail("Failed to add note"))
        }
    }
}
