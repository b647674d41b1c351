use askama::Template;

use crate::models::file::FolderInfo;

#[derive(Template)]
#[template(path = "modules/import.html")]
pub struct ImportTemplate {
    pub module_id: i64,
    pub module_title: String,
    pub csrf_token: String,
    pub flash: Option<String>,
    pub return_url: String,
    pub folders: Vec<FolderInfo>,
    /// Document text to show in the box, kept after a failed submission.
    pub content: String,
    pub message: Option<String>,
    pub severity_class: String,
}
