use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, MySql};

#[derive(Debug, Serialize, FromRow)]
pub struct Activity {
    pub activity_id: i64,
    pub association_id: i64,
    pub activity_type: String,
    pub description: String,
    pub user_name: String,
    pub created_at: NaiveDateTime,
}

impl Activity {
    // Append an audit trail entry; works on a pool or inside a transaction
    pub async fn record<'e, E>(
        executor: E,
        association_id: i64,
        activity_type: &str,
        description: &str,
        user_name: &str,
    ) -> Result<(), sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = MySql>,
    {
        sqlx::query(
            "INSERT INTO Activities_ (association_id, activity_type, description, user_name) VALUES (?, ?, ?, ?)",
        )
        .bind(association_id)
        .bind(activity_type)
        .bind(description)
        .bind(user_name)
        .execute(executor)
        .await?;
        Ok(())
    }
}
