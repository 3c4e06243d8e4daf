use crate::models::activity::Activity;

pub type ListActivitiesResponse = crate::routes::common::ListResponse<Activity>;
