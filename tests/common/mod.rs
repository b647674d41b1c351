//! Shared test infrastructure: an in-memory portal and recording content handlers.
//!
//! `FakePortal` implements every storage trait the import path uses, so the
//! dispatcher, the permission gate and the HTTP routes run unchanged against it.
//!
//! # Fixture
//! - portal 0, tab 55
//! - module 100 "Blog" (friendly name "Blog Module"), definition 10 "Blog"
//! - module 101 "HTML", definition 20 "Text/HTML", same tab
//! - roles 1 Administrators, 2 Editors; users 1 admin (superuser), 2 editor, 3 viewer
//! - editor holds module EDIT on module 100
//! - folder 7 "Exports/" with Blog and Forum export files

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use portal_import::audit::{AuditEntry, AuditLog};
use portal_import::models::file::{FileInfo, FolderInfo};
use portal_import::models::module::{DesktopModule, ModuleInfo};
use portal_import::models::permission_grant::TabPermission;
use portal_import::models::principal::{ALL_USERS_ROLE_ID, Permission, Role, User};
use portal_import::portable::{HandlerError, HandlerRegistry, Portable};
use portal_import::store::{
    ContentStream, FileStore, ModuleStore, PermissionCatalog, PrincipalDirectory, StoreError,
    StoreResult, TabPermissionStore,
};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const PORTAL_ID: i64 = 0;
pub const TAB_ID: i64 = 55;
pub const BLOG_MODULE_ID: i64 = 100;
pub const BLOG_DEF_ID: i64 = 10;
pub const HTML_MODULE_ID: i64 = 101;
pub const HTML_DEF_ID: i64 = 20;
pub const EXPORT_FOLDER_ID: i64 = 7;
pub const BLOG_CONTROLLER: &str = "Portal.Modules.Blog.BlogController";

pub const ADMIN_USER_ID: i64 = 1;
pub const EDITOR_USER_ID: i64 = 2;
pub const VIEWER_USER_ID: i64 = 3;
pub const EDITORS_ROLE_ID: i64 = 2;

pub const TAB_VIEW_PERMISSION_ID: i64 = 1;
pub const TAB_EDIT_PERMISSION_ID: i64 = 2;

// ============================================================================
// IN-MEMORY PORTAL
// ============================================================================

/// A module permission row: (module, role, user, key, allow).
pub type ModuleGrant = (i64, Option<i64>, Option<i64>, &'static str, bool);

pub enum StoredFile {
    Text(String),
    /// Opens, then fails on the first read.
    Broken,
    /// Listed, but opening fails.
    Missing,
}

#[derive(Default)]
pub struct PortalState {
    pub modules: Vec<ModuleInfo>,
    pub roles: Vec<Role>,
    pub users: Vec<User>,
    pub user_roles: Vec<(i64, i64)>,
    pub permissions: Vec<Permission>,
    pub module_grants: Vec<ModuleGrant>,
    pub tab_permissions: Vec<TabPermission>,
    pub module_settings: HashMap<(i64, String), String>,
    pub tab_module_settings: HashMap<(i64, String), String>,
    pub folders: Vec<FolderInfo>,
    pub files: Vec<(FileInfo, StoredFile)>,
    pub audit: Vec<AuditEntry>,
    pub fail_audit: bool,
}

#[derive(Default)]
pub struct FakePortal {
    pub state: Mutex<PortalState>,
    /// Content streams currently open.
    pub open_streams: Arc<AtomicUsize>,
}

impl FakePortal {
    pub fn state(&self) -> std::sync::MutexGuard<'_, PortalState> {
        self.state.lock().expect("portal state poisoned")
    }

    pub fn module(&self, module_id: i64) -> ModuleInfo {
        self.state()
            .modules
            .iter()
            .find(|m| m.module_id == module_id)
            .cloned()
            .expect("fixture module")
    }
}

pub fn blog_desktop() -> DesktopModule {
    DesktopModule {
        desktop_module_id: 1,
        module_name: "Blog".to_string(),
        friendly_name: "Blog Module".to_string(),
        business_controller: Some(BLOG_CONTROLLER.to_string()),
        is_portable: true,
    }
}

pub fn html_desktop() -> DesktopModule {
    DesktopModule {
        desktop_module_id: 2,
        module_name: "HTML".to_string(),
        friendly_name: "HTML".to_string(),
        business_controller: Some("Portal.Modules.Html.HtmlTextController".to_string()),
        is_portable: true,
    }
}

pub fn module_on_tab(
    module_id: i64,
    tab_module_id: i64,
    module_def_id: i64,
    definition_name: &str,
    desktop_module: DesktopModule,
) -> ModuleInfo {
    ModuleInfo {
        module_id,
        tab_id: TAB_ID,
        tab_module_id,
        portal_id: PORTAL_ID,
        module_def_id,
        definition_name: definition_name.to_string(),
        title: format!("Module {module_id}"),
        header: String::new(),
        footer: String::new(),
        alignment: String::new(),
        color: String::new(),
        border: String::new(),
        icon_file: String::new(),
        cache_time: 0,
        container_src: String::new(),
        display_title: true,
        display_print: true,
        inherit_view_permissions: true,
        start_date: None,
        end_date: None,
        desktop_module,
    }
}

fn user(user_id: i64, username: &str, is_superuser: bool) -> User {
    User {
        user_id,
        username: username.to_string(),
        display_name: username.to_string(),
        is_superuser,
    }
}

fn permission(permission_id: i64, code: &str, key: &str, name: &str) -> Permission {
    Permission {
        permission_id,
        permission_code: code.to_string(),
        permission_key: key.to_string(),
        permission_name: name.to_string(),
    }
}

fn file(file_id: i64, file_name: &str, extension: &str) -> FileInfo {
    FileInfo {
        file_id,
        folder_id: EXPORT_FOLDER_ID,
        file_name: file_name.to_string(),
        extension: extension.to_string(),
    }
}

/// The standard portal described in the module docs.
pub fn setup_portal() -> FakePortal {
    let state = PortalState {
        modules: vec![
            module_on_tab(BLOG_MODULE_ID, 500, BLOG_DEF_ID, "Blog", blog_desktop()),
            module_on_tab(HTML_MODULE_ID, 501, HTML_DEF_ID, "Text/HTML", html_desktop()),
        ],
        roles: vec![
            Role {
                role_id: 1,
                portal_id: PORTAL_ID,
                role_name: "Administrators".to_string(),
            },
            Role {
                role_id: EDITORS_ROLE_ID,
                portal_id: PORTAL_ID,
                role_name: "Editors".to_string(),
            },
        ],
        users: vec![
            user(ADMIN_USER_ID, "admin", true),
            user(EDITOR_USER_ID, "editor", false),
            user(VIEWER_USER_ID, "viewer", false),
        ],
        permissions: vec![
            permission(TAB_VIEW_PERMISSION_ID, "SYSTEM_TAB", "VIEW", "View Tab"),
            permission(TAB_EDIT_PERMISSION_ID, "SYSTEM_TAB", "EDIT", "Edit Tab"),
        ],
        module_grants: vec![(BLOG_MODULE_ID, None, Some(EDITOR_USER_ID), "EDIT", true)],
        folders: vec![FolderInfo {
            folder_id: EXPORT_FOLDER_ID,
            portal_id: PORTAL_ID,
            folder_path: "Exports/".to_string(),
        }],
        files: vec![
            (
                file(70, "content.Blog.2024-05-01.xml", "xml"),
                StoredFile::Text(r#"<content type="Blog" version="1.0"><entry/></content>"#.to_string()),
            ),
            (
                file(71, "content.BlogModule.legacy.xml", "xml"),
                StoredFile::Broken,
            ),
            (
                file(72, "content.Forum.2024-05-01.xml", "xml"),
                StoredFile::Text(String::new()),
            ),
            (file(73, "content.Blog.notes.txt", "txt"), StoredFile::Missing),
        ],
        ..PortalState::default()
    };
    FakePortal {
        state: Mutex::new(state),
        open_streams: Arc::new(AtomicUsize::new(0)),
    }
}

impl ModuleStore for FakePortal {
    async fn get_module(&self, module_id: i64, tab_id: Option<i64>) -> StoreResult<Option<ModuleInfo>> {
        Ok(self
            .state()
            .modules
            .iter()
            .find(|m| m.module_id == module_id && tab_id.is_none_or(|t| t == m.tab_id))
            .cloned())
    }

    async fn update_module(&self, module: &ModuleInfo) -> StoreResult<()> {
        let mut state = self.state();
        let slot = state
            .modules
            .iter_mut()
            .find(|m| m.tab_module_id == module.tab_module_id)
            .ok_or_else(|| StoreError::NotFound(format!("module {}", module.module_id)))?;
        *slot = module.clone();
        Ok(())
    }

    async fn upsert_module_setting(&self, module_id: i64, name: &str, value: &str) -> StoreResult<()> {
        self.state()
            .module_settings
            .insert((module_id, name.to_string()), value.to_string());
        Ok(())
    }

    async fn upsert_tab_module_setting(&self, tab_module_id: i64, name: &str, value: &str) -> StoreResult<()> {
        self.state()
            .tab_module_settings
            .insert((tab_module_id, name.to_string()), value.to_string());
        Ok(())
    }

    async fn modules_on_tab(&self, tab_id: i64) -> StoreResult<Vec<ModuleInfo>> {
        Ok(self
            .state()
            .modules
            .iter()
            .filter(|m| m.tab_id == tab_id)
            .cloned()
            .collect())
    }

    async fn has_module_permission(&self, module_id: i64, user_id: i64, keys: &[&str]) -> StoreResult<bool> {
        let state = self.state();
        let roles: Vec<i64> = state
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, r)| *r)
            .collect();
        let applicable: Vec<bool> = state
            .module_grants
            .iter()
            .filter(|(m, role, user, key, _)| {
                *m == module_id
                    && keys.iter().any(|k| k.eq_ignore_ascii_case(key))
                    && (*user == Some(user_id)
                        || *role == Some(ALL_USERS_ROLE_ID)
                        || role.is_some_and(|r| roles.contains(&r)))
            })
            .map(|(.., allow)| *allow)
            .collect();
        Ok(applicable.contains(&true) && !applicable.contains(&false))
    }
}

impl PrincipalDirectory for FakePortal {
    async fn role_by_id(&self, portal_id: i64, role_id: i64) -> StoreResult<Option<Role>> {
        Ok(self
            .state()
            .roles
            .iter()
            .find(|r| r.portal_id == portal_id && r.role_id == role_id)
            .cloned())
    }

    async fn role_by_name(&self, portal_id: i64, role_name: &str) -> StoreResult<Option<Role>> {
        Ok(self
            .state()
            .roles
            .iter()
            .find(|r| r.portal_id == portal_id && r.role_name.eq_ignore_ascii_case(role_name))
            .cloned())
    }

    async fn user_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn user_by_name(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }
}

impl PermissionCatalog for FakePortal {
    async fn permission_by_id(&self, permission_id: i64) -> StoreResult<Option<Permission>> {
        Ok(self
            .state()
            .permissions
            .iter()
            .find(|p| p.permission_id == permission_id)
            .cloned())
    }

    async fn permission_by_code_key(&self, code: &str, key: &str) -> StoreResult<Option<Permission>> {
        Ok(self
            .state()
            .permissions
            .iter()
            .find(|p| p.permission_code.eq_ignore_ascii_case(code) && p.permission_key.eq_ignore_ascii_case(key))
            .cloned())
    }
}

impl TabPermissionStore for FakePortal {
    async fn save_tab_permission(&self, permission: &TabPermission) -> StoreResult<()> {
        let mut state = self.state();
        let existing = state.tab_permissions.iter_mut().find(|p| {
            p.tab_id == permission.tab_id
                && p.permission_id == permission.permission_id
                && p.role_id == permission.role_id
                && p.user_id == permission.user_id
                && p.module_def_id == permission.module_def_id
        });
        match existing {
            Some(row) => *row = permission.clone(),
            None => state.tab_permissions.push(permission.clone()),
        }
        Ok(())
    }
}

/// Reader that counts itself in `open` until dropped.
struct TrackedReader {
    bytes: io::Cursor<Vec<u8>>,
    broken: bool,
    open: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.broken {
            return Poll::Ready(Err(io::Error::other("disk read failed")));
        }
        Pin::new(&mut self.bytes).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FileStore for FakePortal {
    async fn folders(&self, portal_id: i64) -> StoreResult<Vec<FolderInfo>> {
        Ok(self
            .state()
            .folders
            .iter()
            .filter(|f| f.portal_id == portal_id)
            .cloned()
            .collect())
    }

    async fn folder_by_id(&self, folder_id: i64) -> StoreResult<Option<FolderInfo>> {
        Ok(self.state().folders.iter().find(|f| f.folder_id == folder_id).cloned())
    }

    async fn files_in_folder(&self, folder_id: i64, extension: &str) -> StoreResult<Vec<FileInfo>> {
        Ok(self
            .state()
            .files
            .iter()
            .map(|(f, _)| f)
            .filter(|f| f.folder_id == folder_id && f.extension.eq_ignore_ascii_case(extension))
            .cloned()
            .collect())
    }

    async fn file_by_id(&self, file_id: i64) -> StoreResult<Option<FileInfo>> {
        Ok(self
            .state()
            .files
            .iter()
            .map(|(f, _)| f)
            .find(|f| f.file_id == file_id)
            .cloned())
    }

    async fn open_content(&self, file: &FileInfo) -> StoreResult<ContentStream> {
        let state = self.state();
        let (bytes, broken) = match state.files.iter().find(|(f, _)| f.file_id == file.file_id) {
            Some((_, StoredFile::Text(text))) => (text.clone().into_bytes(), false),
            Some((_, StoredFile::Broken)) => (Vec::new(), true),
            _ => {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    file.file_name.clone(),
                )));
            }
        };
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedReader {
            bytes: io::Cursor::new(bytes),
            broken,
            open: Arc::clone(&self.open_streams),
        }))
    }
}

impl AuditLog for FakePortal {
    async fn record(&self, entry: &AuditEntry) -> StoreResult<()> {
        let mut state = self.state();
        if state.fail_audit {
            return Err(StoreError::NotFound("audit table".to_string()));
        }
        state.audit.push(entry.clone());
        Ok(())
    }
}

// ============================================================================
// CONTENT HANDLERS
// ============================================================================

/// One call to `import_module`: (module, content, version, user).
pub type ImportCall = (i64, String, String, i64);

#[derive(Default)]
pub struct HandlerLog {
    pub constructed: AtomicUsize,
    pub imports: Mutex<Vec<ImportCall>>,
}

impl HandlerLog {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn imports(&self) -> Vec<ImportCall> {
        self.imports.lock().expect("handler log poisoned").clone()
    }
}

pub struct RecordingHandler {
    log: Arc<HandlerLog>,
    fail_import: bool,
}

#[async_trait]
impl Portable for RecordingHandler {
    async fn export_module(&self, _module_id: i64) -> Result<String, HandlerError> {
        Ok(String::new())
    }

    async fn import_module(
        &self,
        module_id: i64,
        content: &str,
        version: &str,
        user_id: i64,
    ) -> Result<(), HandlerError> {
        self.log
            .imports
            .lock()
            .expect("handler log poisoned")
            .push((module_id, content.to_string(), version.to_string(), user_id));
        if self.fail_import {
            return Err(HandlerError::InvalidContent("rejected by handler".to_string()));
        }
        Ok(())
    }
}

/// Registry with a recording handler for the Blog controller.
pub fn recording_registry(log: Arc<HandlerLog>) -> HandlerRegistry {
    registry_with(log, false)
}

/// Registry whose Blog handler records the call and then fails it.
pub fn failing_import_registry(log: Arc<HandlerLog>) -> HandlerRegistry {
    registry_with(log, true)
}

fn registry_with(log: Arc<HandlerLog>, fail_import: bool) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(BLOG_CONTROLLER, move || {
        log.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingHandler {
            log: Arc::clone(&log),
            fail_import,
        }) as Box<dyn Portable>)
    });
    registry
}

/// Registry whose Blog factory cannot build a handler.
pub fn broken_factory_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(BLOG_CONTROLLER, || {
        Err(HandlerError::Construction("missing assembly".to_string()))
    });
    registry
}
