//! Edit-permission gate in front of every import.

mod common;

use portal_import::auth::module_access::{PORTAL_ADMIN, has_module_edit_access};
use portal_import::auth::session::Permissions;
use portal_import::models::module::NO_MODULE_ID;
use portal_import::models::principal::ALL_USERS_ROLE_ID;
use common::*;

fn no_permissions() -> Permissions {
    Permissions::default()
}

#[tokio::test]
async fn test_user_with_module_edit_passes() {
    let portal = setup_portal();
    let module = portal.module(BLOG_MODULE_ID);

    assert!(has_module_edit_access(&portal, Some(&module), Some(EDITOR_USER_ID), &no_permissions())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_user_without_grant_is_denied() {
    let portal = setup_portal();
    let module = portal.module(BLOG_MODULE_ID);

    assert!(!has_module_edit_access(&portal, Some(&module), Some(VIEWER_USER_ID), &no_permissions())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_superuser_and_portal_admin_bypass_module_grants() {
    let portal = setup_portal();
    let module = portal.module(HTML_MODULE_ID);

    assert!(has_module_edit_access(&portal, Some(&module), Some(ADMIN_USER_ID), &no_permissions())
        .await
        .unwrap());
    assert!(has_module_edit_access(
        &portal,
        Some(&module),
        Some(VIEWER_USER_ID),
        &Permissions(vec![PORTAL_ADMIN.to_string()])
    )
    .await
    .unwrap());
}

#[tokio::test]
async fn test_role_and_all_users_grants_count() {
    let portal = setup_portal();
    {
        let mut state = portal.state();
        state.user_roles.push((VIEWER_USER_ID, EDITORS_ROLE_ID));
        state.module_grants.push((HTML_MODULE_ID, Some(EDITORS_ROLE_ID), None, "IMPORT", true));
        state.module_grants.push((BLOG_MODULE_ID, Some(ALL_USERS_ROLE_ID), None, "EDIT", true));
    }

    let html = portal.module(HTML_MODULE_ID);
    let blog = portal.module(BLOG_MODULE_ID);
    assert!(has_module_edit_access(&portal, Some(&html), Some(VIEWER_USER_ID), &no_permissions())
        .await
        .unwrap());
    assert!(has_module_edit_access(&portal, Some(&blog), Some(VIEWER_USER_ID), &no_permissions())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_explicit_deny_wins() {
    let portal = setup_portal();
    portal
        .state()
        .module_grants
        .push((BLOG_MODULE_ID, None, Some(EDITOR_USER_ID), "EDIT", false));
    let module = portal.module(BLOG_MODULE_ID);

    assert!(!has_module_edit_access(&portal, Some(&module), Some(EDITOR_USER_ID), &no_permissions())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_view_only_grant_is_not_enough() {
    let portal = setup_portal();
    portal
        .state()
        .module_grants
        .push((HTML_MODULE_ID, None, Some(VIEWER_USER_ID), "VIEW", true));
    let module = portal.module(HTML_MODULE_ID);

    assert!(!has_module_edit_access(&portal, Some(&module), Some(VIEWER_USER_ID), &no_permissions())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_missing_module_user_or_sentinel_is_denied() {
    let portal = setup_portal();
    let admin = Permissions(vec![PORTAL_ADMIN.to_string()]);
    let mut sentinel = portal.module(BLOG_MODULE_ID);
    sentinel.module_id = NO_MODULE_ID;

    assert!(!has_module_edit_access(&portal, None, Some(ADMIN_USER_ID), &admin).await.unwrap());
    assert!(!has_module_edit_access(&portal, Some(&sentinel), Some(ADMIN_USER_ID), &admin).await.unwrap());
    let module = portal.module(BLOG_MODULE_ID);
    assert!(!has_module_edit_access(&portal, Some(&module), None, &admin).await.unwrap());
    assert!(!has_module_edit_access(&portal, Some(&module), Some(404), &no_permissions()).await.unwrap());
}
