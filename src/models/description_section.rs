use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct DescriptionSection {
    pub section_id: i64,
    pub association_id: i64,
    pub title: String,
    pub data: Json<Value>,
    pub order_index: i32,
}
