//! Mapping exported tab-permission rows onto the importing portal.
//!
//! Ids from the exporting system are trusted only when the target entity
//! carries the same name (or code/key) the row was exported with; otherwise
//! the name is looked up instead. Rows that still cannot be resolved are
//! dropped with a warning and never abort the import.

use serde::Serialize;

use crate::models::module::ModuleInfo;
use crate::models::permission_grant::{Grantee, PermissionGrant, TabPermission};
use crate::models::principal::{Permission, Role, User};
use crate::store::{ImportStore, PermissionCatalog, PrincipalDirectory, StoreResult};

/// A grant row that was not applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantWarning {
    pub grant_id: i64,
    pub reason: String,
}

impl GrantWarning {
    fn new(grant: &PermissionGrant, reason: impl Into<String>) -> Self {
        let warning = GrantWarning {
            grant_id: grant.grant_id,
            reason: reason.into(),
        };
        log::warn!("Dropping permission grant {}: {}", warning.grant_id, warning.reason);
        warning
    }

    /// A row that could not be read at all. Its grant id is unknown.
    pub fn unreadable(position: usize, error: impl std::fmt::Display) -> Self {
        let warning = GrantWarning {
            grant_id: 0,
            reason: format!("permission row {} is unreadable: {error}", position + 1),
        };
        log::warn!("Dropping permission row: {}", warning.reason);
        warning
    }
}

/// The local principal a row resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    Role(Role),
    User(User),
}

fn names_agree(found: &str, exported: Option<&str>) -> bool {
    exported.is_none_or(|n| found.eq_ignore_ascii_case(n))
}

pub async fn resolve_permission<S: PermissionCatalog>(
    store: &S,
    grant: &PermissionGrant,
) -> StoreResult<Option<Permission>> {
    if let Some(p) = store.permission_by_id(grant.permission_id).await? {
        if p.matches(&grant.permission_code, &grant.permission_key) {
            return Ok(Some(p));
        }
    }
    if grant.permission_code.trim().is_empty() {
        return Ok(None);
    }
    store
        .permission_by_code_key(&grant.permission_code, &grant.permission_key)
        .await
}

pub async fn resolve_role<S: PrincipalDirectory>(
    store: &S,
    portal_id: i64,
    id: Option<i64>,
    name: Option<&str>,
) -> StoreResult<Option<Role>> {
    if let Some(role) = Role::pseudo(portal_id, id, name) {
        return Ok(Some(role));
    }
    if let Some(id) = id {
        if let Some(role) = store.role_by_id(portal_id, id).await? {
            if names_agree(&role.role_name, name) {
                return Ok(Some(role));
            }
        }
    }
    let Some(name) = name else {
        return Ok(None);
    };
    match Role::pseudo(portal_id, None, Some(name)) {
        Some(role) => Ok(Some(role)),
        None => store.role_by_name(portal_id, name).await,
    }
}

pub async fn resolve_user<S: PrincipalDirectory>(
    store: &S,
    id: Option<i64>,
    name: Option<&str>,
) -> StoreResult<Option<User>> {
    if let Some(id) = id {
        if let Some(user) = store.user_by_id(id).await? {
            if names_agree(&user.username, name) {
                return Ok(Some(user));
            }
        }
    }
    match name {
        Some(n) => store.user_by_name(n).await,
        None => Ok(None),
    }
}

/// Resolve the row's principal, or explain why it cannot be.
pub async fn resolve_principal<S: PrincipalDirectory>(
    store: &S,
    portal_id: i64,
    grant: &PermissionGrant,
) -> StoreResult<Result<Principal, String>> {
    let grantee = match grant.grantee() {
        Ok(g) => g,
        Err(e) => return Ok(Err(e.to_string())),
    };
    let resolved = match grantee {
        Grantee::Role { id, name } => resolve_role(store, portal_id, id, name)
            .await?
            .map(Principal::Role)
            .ok_or_else(|| format!("role {} not found", describe(id, name))),
        Grantee::User { id, name } => resolve_user(store, id, name)
            .await?
            .map(Principal::User)
            .ok_or_else(|| format!("user {} not found", describe(id, name))),
    };
    Ok(resolved)
}

fn describe(id: Option<i64>, name: Option<&str>) -> String {
    match (id, name) {
        (_, Some(n)) => format!("'{n}'"),
        (Some(id), None) => format!("#{id}"),
        (None, None) => "(unnamed)".to_string(),
    }
}

/// The definition on the target tab a module-scoped row applies to.
fn target_definition(grant: &PermissionGrant, on_tab: &[ModuleInfo]) -> Option<i64> {
    let exported_name = grant
        .friendly_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let by_id = on_tab.iter().find(|m| {
        Some(m.module_def_id) == grant.module_definition_id
            && names_agree(&m.definition_name, exported_name)
    });
    let by_name = || {
        exported_name.and_then(|n| {
            on_tab
                .iter()
                .find(|m| m.definition_name.eq_ignore_ascii_case(n))
        })
    };
    by_id.or_else(by_name).map(|m| m.module_def_id)
}

fn tab_permission(
    grant: &PermissionGrant,
    tab_id: i64,
    permission: &Permission,
    principal: &Principal,
    module_def_id: Option<i64>,
) -> TabPermission {
    let (role_id, user_id) = match principal {
        Principal::Role(r) => (Some(r.role_id), None),
        Principal::User(u) => (None, Some(u.user_id)),
    };
    TabPermission {
        tab_id,
        permission_id: permission.permission_id,
        allow_access: grant.allow_access,
        role_id,
        user_id,
        module_def_id,
        created_by_user_id: grant.created_by_user_id,
        created_on_date: grant.created_on_date,
        last_modified_by_user_id: grant.last_modified_by_user_id,
        last_modified_on_date: grant.last_modified_on_date,
        created_by_user_name: grant.created_by_user_name.clone(),
        last_modified_by_user_name: grant.last_modified_by_user_name.clone(),
    }
}

/// Apply `grants` to the tab `module` is placed on.
///
/// Rows scoped to a module definition are applied last, against the modules
/// present on the tab at that point. Storage errors abort; unresolvable rows
/// only produce warnings.
pub async fn apply_grants<S: ImportStore>(
    store: &S,
    module: &ModuleInfo,
    grants: &[PermissionGrant],
) -> StoreResult<Vec<GrantWarning>> {
    let mut warnings = Vec::new();
    let mut scoped = Vec::new();

    for grant in grants {
        let Some(permission) = resolve_permission(store, grant).await? else {
            warnings.push(GrantWarning::new(
                grant,
                format!(
                    "permission {}/{} not found",
                    grant.permission_code, grant.permission_key
                ),
            ));
            continue;
        };
        let principal = match resolve_principal(store, module.portal_id, grant).await? {
            Ok(p) => p,
            Err(reason) => {
                warnings.push(GrantWarning::new(grant, reason));
                continue;
            }
        };
        if grant.is_module_scoped() {
            scoped.push((grant, permission, principal));
            continue;
        }
        store
            .save_tab_permission(&tab_permission(grant, module.tab_id, &permission, &principal, None))
            .await?;
    }

    if !scoped.is_empty() {
        let on_tab = store.modules_on_tab(module.tab_id).await?;
        for (grant, permission, principal) in scoped {
            match target_definition(grant, &on_tab) {
                Some(def_id) => {
                    store
                        .save_tab_permission(&tab_permission(
                            grant,
                            module.tab_id,
                            &permission,
                            &principal,
                            Some(def_id),
                        ))
                        .await?;
                }
                None => warnings.push(GrantWarning::new(
                    grant,
                    format!(
                        "no module of definition {} on tab {}",
                        describe(grant.module_definition_id, grant.friendly_name.as_deref()),
                        module.tab_id
                    ),
                )),
            }
        }
    }

    Ok(warnings)
}
