use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderInfo {
    pub folder_id: i64,
    pub portal_id: i64,
    /// Portal-relative path, `/`-separated, with a trailing `/` (root is empty).
    pub folder_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub file_id: i64,
    pub folder_id: i64,
    pub file_name: String,
    pub extension: String,
}
