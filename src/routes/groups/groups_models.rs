use serde::Deserialize;

use crate::models::group::Group;

pub type ListGroupsResponse = crate::routes::common::ListResponse<Group>;

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub group_name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub association_id: i64,
}
