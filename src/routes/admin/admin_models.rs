use serde::Deserialize;

use crate::models::user::User;

pub const ROLES: &[&str] = &["ADMIN", "MANAGER", "USER"];

pub type ListUsersResponse = crate::routes::common::ListResponse<User>;

#[derive(Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

impl UpdateRoleRequest {
    // Canonical upper-case role, if it is a known one
    pub fn normalized_role(&self) -> Option<&'static str> {
        let role = self.role.trim();
        ROLES.iter().copied().find(|known| known.eq_ignore_ascii_case(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_case_insensitive_and_closed() {
        let request = UpdateRoleRequest { role: " manager ".into() };
        assert_eq!(request.normalized_role(), Some("MANAGER"));
        let request = UpdateRoleRequest { role: "root".into() };
        assert_eq!(request.normalized_role(), None);
    }
}
