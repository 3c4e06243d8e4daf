use serde::Deserialize;

use crate::models::tag::Tag;

#[derive(Deserialize)]
pub struct ListTagsQuery {
    pub association_id: Option<i64>,
}

pub type ListTagsResponse = crate::routes::common::ListResponse<Tag>;

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub tag_name: String,
    pub tag_color: Option<String>,
}

// Used by both attach and detach
#[derive(Deserialize)]
pub struct TagAssignmentRequest {
    pub association_id: i64,
    pub tag_id: i64,
}
