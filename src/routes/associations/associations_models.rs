use serde::{Deserialize, Serialize};

use crate::models::association::{Association, AssociationListItem};
use crate::models::contact::Contact;
use crate::models::description_section::DescriptionSection;
use crate::models::tag::Tag;

#[derive(Deserialize)]
pub struct ListAssociationsQuery {
    pub q: Option<String>,
    // municipality id or name
    pub municipality: Option<String>,
    // tag id or name
    pub tag: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort: Option<String>,
}

pub type ListAssociationsResponse = crate::routes::common::PagedResponse<AssociationListItem>;

#[derive(Serialize)]
pub struct AssociationDetailResponse {
    pub association: Association,
    pub contacts: Vec<Contact>,
    pub tags: Vec<Tag>,
    pub sections: Vec<DescriptionSection>,
}

#[derive(Deserialize)]
pub struct CreateAssociationRequest {
    pub name: String,
    pub municipality_id: i64,
    pub org_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub homepage_url: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

// Absent fields are left untouched
#[derive(Deserialize, Default)]
pub struct UpdateAssociationRequest {
    pub name: Option<String>,
    pub org_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub homepage_url: Option<String>,
    pub street_address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub types: Option<Vec<String>>,
}

impl UpdateAssociationRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.org_number.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.homepage_url.is_none()
            && self.street_address.is_none()
            && self.postal_code.is_none()
            && self.city.is_none()
            && self.description.is_none()
            && self.types.is_none()
    }
}

pub fn order_by(sort: Option<&str>) -> &'static str {
    match sort.unwrap_or("name_asc") {
        "name_desc" => "a.name DESC",
        "updated_asc" => "a.updated_at ASC",
        "updated_desc" => "a.updated_at DESC",
        _ => "a.name ASC",
    }
}
