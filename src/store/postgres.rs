use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{
    ContentStream, FileStore, ModuleStore, PermissionCatalog, PrincipalDirectory, StoreError,
    StoreResult, TabPermissionStore,
};
use crate::audit::{AuditEntry, AuditLog};
use crate::models::file::{FileInfo, FolderInfo};
use crate::models::module::{DesktopModule, ModuleInfo};
use crate::models::permission_grant::TabPermission;
use crate::models::principal::{ALL_USERS_ROLE_ID, Permission, Role, User};

/// Postgres-backed portal storage. File bodies live on disk under
/// `<files_root>/<portal_id>/<folder_path><file_name>`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    files_root: PathBuf,
}

impl PgStore {
    pub fn new(pool: PgPool, files_root: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            files_root: files_root.into(),
        }
    }
}

const MODULE_SELECT: &str = "\
    SELECT m.id AS module_id, tm.tab_id, tm.id AS tab_module_id, m.portal_id, \
           m.module_def_id, md.friendly_name AS definition_name, \
           m.title, m.header, m.footer, tm.alignment, tm.color, tm.border, tm.icon_file, \
           tm.cache_time, tm.container_src, tm.display_title, tm.display_print, \
           m.inherit_view_permissions, m.start_date, m.end_date, \
           dm.id AS desktop_module_id, dm.module_name, dm.friendly_name, \
           dm.business_controller, dm.is_portable \
    FROM modules m \
    JOIN tab_modules tm ON tm.module_id = m.id \
    JOIN module_definitions md ON md.id = m.module_def_id \
    JOIN desktop_modules dm ON dm.id = md.desktop_module_id";

#[derive(FromRow)]
struct ModuleRow {
    module_id: i64,
    tab_id: i64,
    tab_module_id: i64,
    portal_id: i64,
    module_def_id: i64,
    definition_name: String,
    title: String,
    header: String,
    footer: String,
    alignment: String,
    color: String,
    border: String,
    icon_file: String,
    cache_time: i32,
    container_src: String,
    display_title: bool,
    display_print: bool,
    inherit_view_permissions: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    desktop_module_id: i64,
    module_name: String,
    friendly_name: String,
    business_controller: Option<String>,
    is_portable: bool,
}

impl From<ModuleRow> for ModuleInfo {
    fn from(r: ModuleRow) -> Self {
        ModuleInfo {
            module_id: r.module_id,
            tab_id: r.tab_id,
            tab_module_id: r.tab_module_id,
            portal_id: r.portal_id,
            module_def_id: r.module_def_id,
            definition_name: r.definition_name,
            title: r.title,
            header: r.header,
            footer: r.footer,
            alignment: r.alignment,
            color: r.color,
            border: r.border,
            icon_file: r.icon_file,
            cache_time: r.cache_time,
            container_src: r.container_src,
            display_title: r.display_title,
            display_print: r.display_print,
            inherit_view_permissions: r.inherit_view_permissions,
            start_date: r.start_date,
            end_date: r.end_date,
            desktop_module: DesktopModule {
                desktop_module_id: r.desktop_module_id,
                module_name: r.module_name,
                friendly_name: r.friendly_name,
                business_controller: r.business_controller,
                is_portable: r.is_portable,
            },
        }
    }
}

impl ModuleStore for PgStore {
    async fn get_module(&self, module_id: i64, tab_id: Option<i64>) -> StoreResult<Option<ModuleInfo>> {
        let sql = format!(
            "{MODULE_SELECT} WHERE m.id = $1 AND ($2::BIGINT IS NULL OR tm.tab_id = $2) \
             ORDER BY tm.id LIMIT 1"
        );
        let row: Option<ModuleRow> = sqlx::query_as(&sql)
            .bind(module_id)
            .bind(tab_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ModuleInfo::from))
    }

    async fn update_module(&self, module: &ModuleInfo) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE modules SET title = $1, header = $2, footer = $3, \
                    inherit_view_permissions = $4, start_date = $5, end_date = $6 \
             WHERE id = $7",
        )
        .bind(&module.title)
        .bind(&module.header)
        .bind(&module.footer)
        .bind(module.inherit_view_permissions)
        .bind(module.start_date)
        .bind(module.end_date)
        .bind(module.module_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE tab_modules SET alignment = $1, color = $2, border = $3, icon_file = $4, \
                    cache_time = $5, container_src = $6, display_title = $7, display_print = $8 \
             WHERE id = $9",
        )
        .bind(&module.alignment)
        .bind(&module.color)
        .bind(&module.border)
        .bind(&module.icon_file)
        .bind(module.cache_time)
        .bind(&module.container_src)
        .bind(module.display_title)
        .bind(module.display_print)
        .bind(module.tab_module_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_module_setting(&self, module_id: i64, name: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO module_settings (module_id, setting_name, setting_value) VALUES ($1, $2, $3) \
             ON CONFLICT (module_id, setting_name) DO UPDATE SET setting_value = EXCLUDED.setting_value",
        )
        .bind(module_id)
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_tab_module_setting(&self, tab_module_id: i64, name: &str, value: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tab_module_settings (tab_module_id, setting_name, setting_value) VALUES ($1, $2, $3) \
             ON CONFLICT (tab_module_id, setting_name) DO UPDATE SET setting_value = EXCLUDED.setting_value",
        )
        .bind(tab_module_id)
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn modules_on_tab(&self, tab_id: i64) -> StoreResult<Vec<ModuleInfo>> {
        let sql = format!("{MODULE_SELECT} WHERE tm.tab_id = $1 ORDER BY tm.id");
        let rows: Vec<ModuleRow> = sqlx::query_as(&sql)
            .bind(tab_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ModuleInfo::from).collect())
    }

    async fn has_module_permission(&self, module_id: i64, user_id: i64, keys: &[&str]) -> StoreResult<bool> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let row: (bool, bool) = sqlx::query_as(
            "SELECT COALESCE(bool_or(mp.allow_access), FALSE) AS allowed, \
                    COALESCE(bool_or(NOT mp.allow_access), FALSE) AS denied \
             FROM module_permissions mp \
             JOIN permissions p ON p.id = mp.permission_id \
             WHERE mp.module_id = $1 \
               AND p.permission_key = ANY($2) \
               AND (mp.user_id = $3 \
                    OR mp.role_id = $4 \
                    OR mp.role_id IN (SELECT role_id FROM user_roles WHERE user_id = $3))",
        )
        .bind(module_id)
        .bind(&keys)
        .bind(user_id)
        .bind(ALL_USERS_ROLE_ID)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 && !row.1)
    }
}

impl PrincipalDirectory for PgStore {
    async fn role_by_id(&self, portal_id: i64, role_id: i64) -> StoreResult<Option<Role>> {
        let row: Option<(i64, i64, String)> = sqlx::query_as(
            "SELECT id, portal_id, role_name FROM roles WHERE portal_id = $1 AND id = $2",
        )
        .bind(portal_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(role_id, portal_id, role_name)| Role { role_id, portal_id, role_name }))
    }

    async fn role_by_name(&self, portal_id: i64, role_name: &str) -> StoreResult<Option<Role>> {
        let row: Option<(i64, i64, String)> = sqlx::query_as(
            "SELECT id, portal_id, role_name FROM roles \
             WHERE portal_id = $1 AND lower(role_name) = lower($2)",
        )
        .bind(portal_id)
        .bind(role_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(role_id, portal_id, role_name)| Role { role_id, portal_id, role_name }))
    }

    async fn user_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        let row: Option<(i64, String, String, bool)> = sqlx::query_as(
            "SELECT id, username, display_name, is_superuser FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(user_id, username, display_name, is_superuser)| User {
            user_id,
            username,
            display_name,
            is_superuser,
        }))
    }

    async fn user_by_name(&self, username: &str) -> StoreResult<Option<User>> {
        let row: Option<(i64, String, String, bool)> = sqlx::query_as(
            "SELECT id, username, display_name, is_superuser FROM users \
             WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(user_id, username, display_name, is_superuser)| User {
            user_id,
            username,
            display_name,
            is_superuser,
        }))
    }
}

type PermissionRow = (i64, String, String, String);

fn permission(row: PermissionRow) -> Permission {
    let (permission_id, permission_code, permission_key, permission_name) = row;
    Permission {
        permission_id,
        permission_code,
        permission_key,
        permission_name,
    }
}

impl PermissionCatalog for PgStore {
    async fn permission_by_id(&self, permission_id: i64) -> StoreResult<Option<Permission>> {
        let row: Option<PermissionRow> = sqlx::query_as(
            "SELECT id, permission_code, permission_key, permission_name FROM permissions WHERE id = $1",
        )
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(permission))
    }

    async fn permission_by_code_key(&self, code: &str, key: &str) -> StoreResult<Option<Permission>> {
        let row: Option<PermissionRow> = sqlx::query_as(
            "SELECT id, permission_code, permission_key, permission_name FROM permissions \
             WHERE upper(permission_code) = upper($1) AND upper(permission_key) = upper($2)",
        )
        .bind(code)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(permission))
    }
}

impl TabPermissionStore for PgStore {
    async fn save_tab_permission(&self, p: &TabPermission) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE tab_permissions SET allow_access = $1, \
                    created_by_user_id = $2, created_on_date = $3, \
                    last_modified_by_user_id = $4, last_modified_on_date = $5, \
                    created_by_user_name = $6, last_modified_by_user_name = $7 \
             WHERE tab_id = $8 AND permission_id = $9 \
               AND role_id IS NOT DISTINCT FROM $10 \
               AND user_id IS NOT DISTINCT FROM $11 \
               AND module_def_id IS NOT DISTINCT FROM $12",
        )
        .bind(p.allow_access)
        .bind(p.created_by_user_id)
        .bind(p.created_on_date)
        .bind(p.last_modified_by_user_id)
        .bind(p.last_modified_on_date)
        .bind(&p.created_by_user_name)
        .bind(&p.last_modified_by_user_name)
        .bind(p.tab_id)
        .bind(p.permission_id)
        .bind(p.role_id)
        .bind(p.user_id)
        .bind(p.module_def_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            sqlx::query(
                "INSERT INTO tab_permissions (tab_id, permission_id, allow_access, role_id, user_id, \
                        module_def_id, created_by_user_id, created_on_date, last_modified_by_user_id, \
                        last_modified_on_date, created_by_user_name, last_modified_by_user_name) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(p.tab_id)
            .bind(p.permission_id)
            .bind(p.allow_access)
            .bind(p.role_id)
            .bind(p.user_id)
            .bind(p.module_def_id)
            .bind(p.created_by_user_id)
            .bind(p.created_on_date)
            .bind(p.last_modified_by_user_id)
            .bind(p.last_modified_on_date)
            .bind(&p.created_by_user_name)
            .bind(&p.last_modified_by_user_name)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Join `relative` onto `root`, refusing anything that would leave `root`.
fn contained_path(root: &Path, relative: &str) -> StoreResult<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(StoreError::NotFound(format!(
            "refusing path outside files root: {}",
            relative.display()
        )));
    }
    Ok(root.join(relative))
}

impl FileStore for PgStore {
    async fn folders(&self, portal_id: i64) -> StoreResult<Vec<FolderInfo>> {
        let rows: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT id, portal_id, folder_path FROM folders WHERE portal_id = $1 ORDER BY folder_path",
        )
        .bind(portal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(folder_id, portal_id, folder_path)| FolderInfo {
                folder_id,
                portal_id,
                folder_path,
            })
            .collect())
    }

    async fn folder_by_id(&self, folder_id: i64) -> StoreResult<Option<FolderInfo>> {
        let row: Option<(i64, i64, String)> =
            sqlx::query_as("SELECT id, portal_id, folder_path FROM folders WHERE id = $1")
                .bind(folder_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(folder_id, portal_id, folder_path)| FolderInfo {
            folder_id,
            portal_id,
            folder_path,
        }))
    }

    async fn files_in_folder(&self, folder_id: i64, extension: &str) -> StoreResult<Vec<FileInfo>> {
        let rows: Vec<(i64, i64, String, String)> = sqlx::query_as(
            "SELECT id, folder_id, file_name, extension FROM files \
             WHERE folder_id = $1 AND lower(extension) = lower($2) ORDER BY file_name",
        )
        .bind(folder_id)
        .bind(extension)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(file_id, folder_id, file_name, extension)| FileInfo {
                file_id,
                folder_id,
                file_name,
                extension,
            })
            .collect())
    }

    async fn file_by_id(&self, file_id: i64) -> StoreResult<Option<FileInfo>> {
        let row: Option<(i64, i64, String, String)> =
            sqlx::query_as("SELECT id, folder_id, file_name, extension FROM files WHERE id = $1")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(file_id, folder_id, file_name, extension)| FileInfo {
            file_id,
            folder_id,
            file_name,
            extension,
        }))
    }

    async fn open_content(&self, file: &FileInfo) -> StoreResult<ContentStream> {
        let folder = self
            .folder_by_id(file.folder_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("folder {}", file.folder_id)))?;
        let relative = format!(
            "{}/{}{}",
            folder.portal_id, folder.folder_path, file.file_name
        );
        let path = contained_path(&self.files_root, &relative)?;
        let handle = tokio::fs::File::open(&path).await?;
        Ok(Box::new(handle))
    }
}

impl AuditLog for PgStore {
    async fn record(&self, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_entries (user_id, action, target_type, target_id, details) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.target_type)
        .bind(entry.target_id)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
