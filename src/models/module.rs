use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::import::canonical::clean_name;

/// Module id used when the request did not carry a parsable `moduleid`.
/// No module has this id, so it always fails the permission gate.
pub const NO_MODULE_ID: i64 = -1;

/// The installed module package a module instance was created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesktopModule {
    pub desktop_module_id: i64,
    pub module_name: String,
    pub friendly_name: String,
    /// Registry key of the content handler, if the package ships one.
    pub business_controller: Option<String>,
    pub is_portable: bool,
}

impl DesktopModule {
    pub fn canonical_module_name(&self) -> String {
        clean_name(&self.module_name)
    }

    pub fn canonical_friendly_name(&self) -> String {
        clean_name(&self.friendly_name)
    }

    /// True when `doc_type` names this package by either canonical name.
    pub fn accepts_type(&self, doc_type: &str) -> bool {
        doc_type == self.canonical_module_name() || doc_type == self.canonical_friendly_name()
    }
}

/// A module instance as placed on one tab, with its package descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub module_id: i64,
    pub tab_id: i64,
    pub tab_module_id: i64,
    pub portal_id: i64,
    pub module_def_id: i64,
    /// Friendly name of the module definition (not the package).
    pub definition_name: String,
    pub title: String,
    pub header: String,
    pub footer: String,
    pub alignment: String,
    pub color: String,
    pub border: String,
    pub icon_file: String,
    pub cache_time: i32,
    pub container_src: String,
    pub display_title: bool,
    pub display_print: bool,
    pub inherit_view_permissions: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub desktop_module: DesktopModule,
}
