/// Pseudo-role every visitor belongs to. Not stored in `roles`.
pub const ALL_USERS_ROLE_ID: i64 = -1;
pub const ALL_USERS_ROLE_NAME: &str = "All Users";

/// Pseudo-role for anonymous visitors. Not stored in `roles`.
pub const UNAUTHENTICATED_ROLE_ID: i64 = -3;
pub const UNAUTHENTICATED_ROLE_NAME: &str = "Unauthenticated Users";

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub role_id: i64,
    pub portal_id: i64,
    pub role_name: String,
}

impl Role {
    /// The pseudo-role named by `id` and `name`. When both are given they must
    /// name the same pseudo-role. Pseudo-roles exist on every portal, so they
    /// resolve without a lookup.
    pub fn pseudo(portal_id: i64, id: Option<i64>, name: Option<&str>) -> Option<Role> {
        let known = [
            (ALL_USERS_ROLE_ID, ALL_USERS_ROLE_NAME),
            (UNAUTHENTICATED_ROLE_ID, UNAUTHENTICATED_ROLE_NAME),
        ];
        if id.is_none() && name.is_none() {
            return None;
        }
        known
            .iter()
            .find(|(rid, rname)| {
                id.is_none_or(|i| i == *rid) && name.is_none_or(|n| n.eq_ignore_ascii_case(rname))
            })
            .map(|(rid, rname)| Role {
                role_id: *rid,
                portal_id,
                role_name: (*rname).to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub is_superuser: bool,
}

/// An access right from the permission catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    pub permission_id: i64,
    pub permission_code: String,
    pub permission_key: String,
    pub permission_name: String,
}

impl Permission {
    /// Whether this catalog entry is the same right as the exported code/key.
    /// An export that carries no code cannot contradict the id.
    pub fn matches(&self, code: &str, key: &str) -> bool {
        if code.trim().is_empty() {
            return true;
        }
        self.permission_code.eq_ignore_ascii_case(code) && self.permission_key.eq_ignore_ascii_case(key)
    }
}
