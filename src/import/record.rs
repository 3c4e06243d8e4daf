use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// One association entry of the municipal association JSON standard.
//
// The registry platforms disagree on a few shapes (string vs. object
// descriptions, where detail_url lives, which blocks are optional), so every
// field that some source omits is optional here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapedRecord {
    pub source_system: String,
    pub municipality: String,
    #[serde(default)]
    pub scrape_run_id: Option<String>,
    #[serde(default)]
    pub scraped_at: Option<String>,
    pub association: ScrapedAssociation,
    #[serde(default)]
    pub contacts: Option<Vec<ScrapedContact>>,
    // Older scrapers put the detail link next to `association`
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub source_navigation: Option<SourceNavigation>,
    #[serde(default)]
    pub extras: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapedAssociation {
    pub name: String,
    #[serde(default)]
    pub org_number: Option<String>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub activities: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub homepage_url: Option<String>,
    #[serde(default)]
    pub detail_url: Option<String>,
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub description: Option<ScrapedDescription>,
}

// Actor Smartbook emits a bare string, RBOK/IBGO/FRI a structured object
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ScrapedDescription {
    Text(String),
    Structured {
        #[serde(default)]
        free_text: Option<String>,
        #[serde(default)]
        sections: Option<Vec<DescriptionSection>>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DescriptionSection {
    pub title: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapedContact {
    #[serde(default)]
    pub contact_person_name: Option<String>,
    #[serde(default)]
    pub contact_person_role: Option<String>,
    #[serde(default)]
    pub contact_person_email: Option<String>,
    #[serde(default)]
    pub contact_person_phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceNavigation {
    #[serde(default)]
    pub list_page_index: Option<i32>,
    #[serde(default)]
    pub position_on_page: Option<i32>,
    #[serde(default)]
    pub pagination_model: Option<String>,
    #[serde(default)]
    pub filter_state: Option<Value>,
}

impl ScrapedRecord {
    // Basic shape checks that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.municipality.trim().is_empty() {
            return Err("municipality must not be empty".into());
        }
        if self.association.name.trim().is_empty() {
            return Err("association.name must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_smartbook_string_description() {
        let raw = r#"{
            "source_system": "ActorSmartbook",
            "municipality": "Gävle",
            "scrape_run_id": "run-1",
            "scraped_at": "2025-01-10T08:00:00Z",
            "association": {
                "name": "Gävle Schackklubb",
                "org_number": null,
                "types": ["Idrott"],
                "activities": [],
                "categories": [],
                "homepage_url": null,
                "detail_url": "https://gavle.actorsmartbook.se/Associations/1",
                "street_address": null,
                "postal_code": null,
                "city": null,
                "email": null,
                "phone": null,
                "description": "Vi spelar schack."
            },
            "contacts": [],
            "source_navigation": {"list_page_index": 1, "position_on_page": 3, "pagination_model": "paged", "filter_state": null},
            "extras": {}
        }"#;
        let record: ScrapedRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(
            record.association.description,
            Some(ScrapedDescription::Text("Vi spelar schack.".into()))
        );
        assert_eq!(record.source_navigation.unwrap().position_on_page, Some(3));
    }

    #[test]
    fn rbok_structured_description_and_missing_blocks() {
        let raw = r#"{
            "source_system": "RBOK",
            "municipality": "Söderhamn",
            "association": {
                "name": "Söderhamns Ridklubb",
                "description": {
                    "free_text": "Ridskola",
                    "sections": [{"title": "Övrigt", "data": {"Medlemmar": 120}}]
                }
            },
            "detail_url": "https://soderhamn.rbok.se/forening/7"
        }"#;
        let record: ScrapedRecord = serde_json::from_str(raw).unwrap();
        assert!(record.contacts.is_none());
        assert!(record.source_navigation.is_none());
        assert_eq!(record.detail_url.as_deref(), Some("https://soderhamn.rbok.se/forening/7"));
        match record.association.description {
            Some(ScrapedDescription::Structured { free_text, sections }) => {
                assert_eq!(free_text.as_deref(), Some("Ridskola"));
                assert_eq!(sections.unwrap()[0].title, "Övrigt");
            }
            other => panic!("unexpected description: {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_blank_name() {
        let raw = r#"{"source_system": "FRI", "municipality": "Askersund", "association": {"name": "  "}}"#;
        let record: ScrapedRecord = serde_json::from_str(raw).unwrap();
        assert!(record.validate().unwrap_err().contains("association.name"));
    }
}
