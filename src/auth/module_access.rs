//! Edit-level access to a single module instance, checked before any import.

use super::session::Permissions;
use crate::models::module::{ModuleInfo, NO_MODULE_ID};
use crate::store::{ModuleStore, PrincipalDirectory, StoreResult};

/// Module permission keys that allow importing content.
pub const EDIT_PERMISSION_KEYS: &[&str] = &["EDIT", "IMPORT"];

/// Session permission that grants edit access to every module.
pub const PORTAL_ADMIN: &str = "portal.admin";

pub async fn has_module_edit_access<S>(
    store: &S,
    module: Option<&ModuleInfo>,
    user_id: Option<i64>,
    permissions: &Permissions,
) -> StoreResult<bool>
where
    S: ModuleStore + PrincipalDirectory,
{
    let Some(module) = module else {
        return Ok(false);
    };
    if module.module_id == NO_MODULE_ID {
        return Ok(false);
    }
    let Some(user_id) = user_id else {
        return Ok(false);
    };
    if permissions.has(PORTAL_ADMIN) {
        return Ok(true);
    }
    match store.user_by_id(user_id).await? {
        None => Ok(false),
        Some(user) if user.is_superuser => Ok(true),
        Some(_) => {
            store
                .has_module_permission(module.module_id, user_id, EDIT_PERMISSION_KEYS)
                .await
        }
    }
}
