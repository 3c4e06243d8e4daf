use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub group_id: i64,
    pub group_name: String,
    pub description: Option<String>,
    pub owner_user_id: i64,
    pub created_at: NaiveDateTime,
    pub member_count: i64,
}
