use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::xml_field::empty_as_none;

/// One exported tab-permission row.
///
/// Numeric ids refer to the exporting system. The code/key/name strings and the
/// principal names are carried alongside so an importing system that has
/// re-keyed its catalog can still resolve the row. Audit fields are preserved
/// verbatim on import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionGrant {
    pub grant_id: i64,
    pub tab_id: i64,
    pub permission_id: i64,
    pub permission_code: String,
    pub permission_key: String,
    pub permission_name: String,
    pub allow_access: bool,
    #[serde(deserialize_with = "empty_as_none")]
    pub role_id: Option<i64>,
    pub role_name: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub user_id: Option<i64>,
    pub username: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub module_definition_id: Option<i64>,
    pub friendly_name: Option<String>,

    #[serde(deserialize_with = "empty_as_none")]
    pub created_by_user_id: Option<i64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub created_on_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_modified_by_user_id: Option<i64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub last_modified_on_date: Option<DateTime<Utc>>,
    pub created_by_user_name: Option<String>,
    pub last_modified_by_user_name: Option<String>,
}

/// The principal a grant row names, as exported.
#[derive(Debug, Clone, PartialEq)]
pub enum Grantee<'a> {
    Role { id: Option<i64>, name: Option<&'a str> },
    User { id: Option<i64>, name: Option<&'a str> },
}

/// Why a grant row cannot name a single principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GranteeError {
    Missing,
    Conflicting,
}

impl std::fmt::Display for GranteeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GranteeError::Missing => write!(f, "grant names neither a role nor a user"),
            GranteeError::Conflicting => write!(f, "grant names both a role and a user"),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl PermissionGrant {
    pub fn role_name(&self) -> Option<&str> {
        non_blank(&self.role_name)
    }

    pub fn username(&self) -> Option<&str> {
        non_blank(&self.username)
    }

    pub fn has_role_reference(&self) -> bool {
        self.role_id.is_some() || self.role_name().is_some()
    }

    pub fn has_user_reference(&self) -> bool {
        self.user_id.is_some() || self.username().is_some()
    }

    /// The single principal this row grants to. Rows carrying both a role and a
    /// user, or neither, are rejected.
    pub fn grantee(&self) -> Result<Grantee<'_>, GranteeError> {
        match (self.has_role_reference(), self.has_user_reference()) {
            (true, false) => Ok(Grantee::Role {
                id: self.role_id,
                name: self.role_name(),
            }),
            (false, true) => Ok(Grantee::User {
                id: self.user_id,
                name: self.username(),
            }),
            (true, true) => Err(GranteeError::Conflicting),
            (false, false) => Err(GranteeError::Missing),
        }
    }

    pub fn is_module_scoped(&self) -> bool {
        self.module_definition_id.is_some()
    }
}

/// A grant resolved against the local catalog, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct TabPermission {
    pub tab_id: i64,
    pub permission_id: i64,
    pub allow_access: bool,
    pub role_id: Option<i64>,
    pub user_id: Option<i64>,
    pub module_def_id: Option<i64>,
    pub created_by_user_id: Option<i64>,
    pub created_on_date: Option<DateTime<Utc>>,
    pub last_modified_by_user_id: Option<i64>,
    pub last_modified_on_date: Option<DateTime<Utc>>,
    pub created_by_user_name: Option<String>,
    pub last_modified_by_user_name: Option<String>,
}
