use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct Municipality {
    pub municipality_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub region: Option<String>,
    pub platform: Option<String>,
    pub homepage: Option<String>,
}

// Listing row with the number of live associations
#[derive(Debug, Serialize, FromRow)]
pub struct MunicipalitySummary {
    pub municipality_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub platform: Option<String>,
    pub association_count: i64,
}
