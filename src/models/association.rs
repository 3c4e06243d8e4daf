use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct Association {
    pub association_id: i64,
    pub municipality_id: i64,
    pub municipality_name: String,
    pub import_batch_id: Option<i64>,
    pub scrape_run_id: Option<String>,
    pub source_system: String,
    pub scraped_at: NaiveDateTime,
    pub detail_url: Option<String>,
    pub name: String,
    pub org_number: Option<String>,
    pub types: Json<Vec<String>>,
    pub activities: Json<Vec<String>>,
    pub categories: Json<Vec<String>>,
    pub homepage_url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub description: Option<Json<Value>>,
    pub description_free_text: Option<String>,
    pub list_page_index: Option<i32>,
    pub position_on_page: Option<i32>,
    pub pagination_model: Option<String>,
    pub filter_state: Option<Json<Value>>,
    pub extras: Option<Json<Value>>,
    pub is_deleted: bool,
    pub deleted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// Compact row for list views
#[derive(Debug, Serialize, FromRow)]
pub struct AssociationListItem {
    pub association_id: i64,
    pub name: String,
    pub municipality_id: i64,
    pub municipality_name: String,
    pub source_system: String,
    pub org_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub homepage_url: Option<String>,
    pub updated_at: NaiveDateTime,
}
