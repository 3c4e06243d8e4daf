use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct ImportBatch {
    pub import_batch_id: i64,
    pub municipality_id: i64,
    pub file_name: String,
    pub file_count: i32,
    pub import_mode: String,
    pub status: String,
    pub total_records: i32,
    pub imported_count: i32,
    pub updated_count: i32,
    pub skipped_count: i32,
    pub deleted_count: i32,
    pub error_count: i32,
    pub errors: Option<Json<Vec<String>>>,
    pub imported_by: String,
    pub imported_by_name: String,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}
