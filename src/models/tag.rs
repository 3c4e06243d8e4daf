use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct Tag {
    pub tag_id: i64,
    pub tag_name: String,
    pub tag_color: Option<String>,
}
