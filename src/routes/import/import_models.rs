use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ImportFilePayload {
    pub name: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub files: Vec<ImportFilePayload>,
    pub mode: Option<String>,
    pub municipality_id: Option<i64>,
    // Falls back to ASSOCIATION_REMOVE_ON_UPDATE
    pub remove_missing: Option<bool>,
    // false rejects files naming a municipality that does not exist yet
    pub create_municipality: Option<bool>,
}

#[derive(Serialize)]
pub struct ImportErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ImportErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        ImportErrorResponse {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_may_be_omitted() {
        let request: ImportRequest =
            serde_json::from_str(r#"{"files": [{"name": "a.json", "content": "[]"}]}"#).unwrap();
        assert_eq!(request.files.len(), 1);
        assert!(request.mode.is_none());
        assert!(request.remove_missing.is_none());
        assert!(request.create_municipality.is_none());
    }
}
