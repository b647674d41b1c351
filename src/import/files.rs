//! Export files offered by the import page's file picker.

use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::models::file::FileInfo;
use crate::models::module::DesktopModule;
use crate::store::{FileStore, StoreError, StoreResult};

pub const EXPORT_EXTENSION: &str = "xml";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOption {
    pub file_id: i64,
    pub label: String,
}

/// File name prefixes of exports for `desktop`. The friendly-name prefix is
/// kept for exports made before the module name was used.
pub fn export_file_prefixes(desktop: &DesktopModule) -> Vec<String> {
    let module_name = desktop.canonical_module_name();
    let friendly_name = desktop.canonical_friendly_name();
    let mut prefixes = vec![format!("content.{module_name}.")];
    if friendly_name != module_name {
        prefixes.push(format!("content.{friendly_name}."));
    }
    prefixes
}

/// Picker entries for the files among `files` that are exports of `desktop`.
pub fn match_export_files(desktop: &DesktopModule, files: &[FileInfo]) -> Vec<FileOption> {
    let prefixes = export_file_prefixes(desktop);
    let mut options = Vec::new();
    for file in files {
        for prefix in &prefixes {
            if file.file_name.contains(prefix.as_str()) {
                options.push(FileOption {
                    file_id: file.file_id,
                    label: file.file_name.replace(prefix.as_str(), ""),
                });
            }
        }
    }
    options
}

/// Picker entries for `folder_id`. Folders of other portals list nothing.
pub async fn list_export_files<S: FileStore>(
    store: &S,
    portal_id: i64,
    desktop: &DesktopModule,
    folder_id: i64,
) -> StoreResult<Vec<FileOption>> {
    match store.folder_by_id(folder_id).await? {
        Some(folder) if folder.portal_id == portal_id => {}
        _ => return Ok(Vec::new()),
    }
    let files = store.files_in_folder(folder_id, EXPORT_EXTENSION).await?;
    Ok(match_export_files(desktop, &files))
}

async fn read_to_string<S: FileStore>(store: &S, portal_id: i64, file_id: i64) -> StoreResult<String> {
    let file = store
        .file_by_id(file_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("file {file_id}")))?;
    match store.folder_by_id(file.folder_id).await? {
        Some(folder) if folder.portal_id == portal_id => {}
        _ => return Err(StoreError::NotFound(format!("file {file_id} in portal {portal_id}"))),
    }
    let mut stream = store.open_content(&file).await?;
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Text of an export file for the document box. Any failure yields empty
/// text; the stream is dropped on every path.
pub async fn read_export_file<S: FileStore>(store: &S, portal_id: i64, file_id: i64) -> String {
    match read_to_string(store, portal_id, file_id).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Could not read export file {file_id}: {e}");
            String::new()
        }
    }
}
