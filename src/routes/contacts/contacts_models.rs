use serde::Deserialize;

use crate::models::contact::{Contact, ContactWithAssociation};
use crate::routes::common::{ListResponse, PagedResponse};

// Either an association's contacts or a global search
#[derive(Deserialize)]
pub struct ListContactsQuery {
    pub association_id: Option<i64>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub type AssociationContactsResponse = ListResponse<Contact>;
pub type SearchContactsResponse = PagedResponse<ContactWithAssociation>;

#[derive(Deserialize)]
pub struct CreateContactRequest {
    pub association_id: i64,
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Deserialize, Default)]
pub struct UpdateContactRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub is_primary: Option<bool>,
}

impl UpdateContactRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.mobile.is_none()
            && self.is_primary.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_with_only_primary_flag_is_not_empty() {
        let request: UpdateContactRequest = serde_json::from_str(r#"{"is_primary": true}"#).unwrap();
        assert!(!request.is_empty());
        assert!(UpdateContactRequest::default().is_empty());
    }

    #[test]
    fn create_defaults_to_non_primary() {
        let request: CreateContactRequest =
            serde_json::from_str(r#"{"association_id": 4, "name": "Anna"}"#).unwrap();
        assert!(!request.is_primary);
        assert_eq!(request.association_id, 4);
    }
}
