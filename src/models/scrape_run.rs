use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct ScrapeRun {
    pub scrape_run_id: String,
    pub municipality_id: i64,
    pub status: String,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub total_found: i32,
    pub total_processed: i32,
}
