use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::models::task::Task;

pub type ListTasksResponse = crate::routes::common::ListResponse<Task>;

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub association_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_date_accepts_iso_without_offset() {
        let request: CreateTaskRequest = serde_json::from_str(
            r#"{"association_id": 1, "title": "Call back", "due_date": "2024-09-01T10:00:00"}"#,
        )
        .unwrap();
        assert!(request.due_date.is_some());
        assert!(request.description.is_none());
    }
}
