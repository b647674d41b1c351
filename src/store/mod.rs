//! Storage collaborators the import path talks to.
//!
//! The dispatcher only ever sees these traits. `PgStore` is the production
//! implementation; tests drive the same code through an in-memory portal.

use std::fmt;
use std::future::Future;

use tokio::io::AsyncRead;

use crate::models::file::{FileInfo, FolderInfo};
use crate::models::module::ModuleInfo;
use crate::models::permission_grant::TabPermission;
use crate::models::principal::{Permission, Role, User};

pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug)]
pub enum StoreError {
    Db(sqlx::Error),
    Io(std::io::Error),
    NotFound(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Db(e) => write!(f, "Database error: {e}"),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::NotFound(what) => write!(f, "Not found: {what}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Db(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A readable file body. Dropping it releases the underlying handle.
pub type ContentStream = Box<dyn AsyncRead + Unpin + Send>;

pub trait ModuleStore: Send + Sync {
    /// The module placed on `tab_id`, or its first placement when no tab is given.
    fn get_module(
        &self,
        module_id: i64,
        tab_id: Option<i64>,
    ) -> impl Future<Output = StoreResult<Option<ModuleInfo>>> + Send;

    /// Persist the module-level and placement-level fields of `module`.
    fn update_module(&self, module: &ModuleInfo) -> impl Future<Output = StoreResult<()>> + Send;

    fn upsert_module_setting(
        &self,
        module_id: i64,
        name: &str,
        value: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn upsert_tab_module_setting(
        &self,
        tab_module_id: i64,
        name: &str,
        value: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn modules_on_tab(&self, tab_id: i64) -> impl Future<Output = StoreResult<Vec<ModuleInfo>>> + Send;

    /// Whether `user_id` holds an allowing module permission with one of `keys`
    /// on `module_id` (directly, through a role, or through "All Users") and no
    /// deny for the same key.
    fn has_module_permission(
        &self,
        module_id: i64,
        user_id: i64,
        keys: &[&str],
    ) -> impl Future<Output = StoreResult<bool>> + Send;
}

pub trait PrincipalDirectory: Send + Sync {
    fn role_by_id(
        &self,
        portal_id: i64,
        role_id: i64,
    ) -> impl Future<Output = StoreResult<Option<Role>>> + Send;
    fn role_by_name(
        &self,
        portal_id: i64,
        role_name: &str,
    ) -> impl Future<Output = StoreResult<Option<Role>>> + Send;
    fn user_by_id(&self, user_id: i64) -> impl Future<Output = StoreResult<Option<User>>> + Send;
    fn user_by_name(&self, username: &str) -> impl Future<Output = StoreResult<Option<User>>> + Send;
}

pub trait PermissionCatalog: Send + Sync {
    fn permission_by_id(
        &self,
        permission_id: i64,
    ) -> impl Future<Output = StoreResult<Option<Permission>>> + Send;
    fn permission_by_code_key(
        &self,
        code: &str,
        key: &str,
    ) -> impl Future<Output = StoreResult<Option<Permission>>> + Send;
}

pub trait TabPermissionStore: Send + Sync {
    /// Insert the row, or replace the decision and provenance of the row with
    /// the same tab, permission, principal and module definition.
    fn save_tab_permission(
        &self,
        permission: &TabPermission,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

pub trait FileStore: Send + Sync {
    fn folders(&self, portal_id: i64) -> impl Future<Output = StoreResult<Vec<FolderInfo>>> + Send;
    fn folder_by_id(&self, folder_id: i64) -> impl Future<Output = StoreResult<Option<FolderInfo>>> + Send;
    fn files_in_folder(
        &self,
        folder_id: i64,
        extension: &str,
    ) -> impl Future<Output = StoreResult<Vec<FileInfo>>> + Send;
    fn file_by_id(&self, file_id: i64) -> impl Future<Output = StoreResult<Option<FileInfo>>> + Send;
    fn open_content(&self, file: &FileInfo) -> impl Future<Output = StoreResult<ContentStream>> + Send;
}

/// Everything the import dispatcher needs.
pub trait ImportStore: ModuleStore + PrincipalDirectory + PermissionCatalog + TabPermissionStore {}

impl<T> ImportStore for T where T: ModuleStore + PrincipalDirectory + PermissionCatalog + TabPermissionStore {}
