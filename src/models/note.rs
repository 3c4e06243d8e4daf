use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct Note {
    pub note_id: i64,
    pub association_id: i64,
    pub content: String,
    pub author: String,
    pub created_at: NaiveDateTime,
}
