use serde::Serialize;
use chrono::NaiveDateTime;

#[derive(sqlx::FromRow, Serialize)]
pub struct Task {
    pub task_id: i64,
    pub association_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDateTime>,
    pub is_completed: bool,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}
