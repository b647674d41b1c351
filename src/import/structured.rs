//! Generic merge of self-describing module documents.
//!
//! A `<module>` document carries the module's own definition: display
//! fields, settings and the tab permissions of the page it was exported from.
//! Only the elements present in the document overwrite the target.

use std::fmt;

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use super::grants::{GrantWarning, apply_grants};
use crate::models::module::ModuleInfo;
use crate::models::permission_grant::PermissionGrant;
use crate::models::xml_field::empty_as_none;
use crate::store::{ImportStore, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDocument {
    #[serde(rename = "@type", default)]
    pub module_type: String,
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub alignment: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub border: Option<String>,
    #[serde(default)]
    pub icon_file: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub cache_time: Option<i32>,
    #[serde(default)]
    pub container_src: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub display_title: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub display_print: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub inherit_view_permissions: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub module_settings: SettingList,
    #[serde(default)]
    pub tab_module_settings: SettingList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingList {
    #[serde(rename = "setting", default)]
    pub items: Vec<Setting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Setting {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug)]
pub enum MergeError {
    Deserialize(quick_xml::DeError),
    Store(StoreError),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::Deserialize(e) => write!(f, "Invalid module document: {e}"),
            MergeError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<quick_xml::DeError> for MergeError {
    fn from(e: quick_xml::DeError) -> Self {
        MergeError::Deserialize(e)
    }
}

impl From<StoreError> for MergeError {
    fn from(e: StoreError) -> Self {
        MergeError::Store(e)
    }
}

pub fn parse_module_document(xml: &str) -> Result<ModuleDocument, MergeError> {
    Ok(quick_xml::de::from_str(xml)?)
}

/// One `<tabPermissions>/<permission>` row, read on its own so a bad row
/// cannot fail the rest of the document.
#[derive(Debug)]
pub enum GrantRow {
    Parsed(PermissionGrant),
    Unreadable { position: usize, error: String },
}

const GRANT_LIST: &str = "tabPermissions";
const GRANT_ROW: &str = "permission";

/// Byte ranges of the permission rows directly under the root's grant list.
fn grant_row_spans(xml: &str) -> Result<Vec<(usize, usize)>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut spans = Vec::new();
    let mut open_row: Option<usize> = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if path.len() == 2 && path[1] == GRANT_LIST && name == GRANT_ROW {
                    open_row = Some(before);
                }
                path.push(name);
            }
            Event::Empty(e) => {
                if path.len() == 2 && path[1] == GRANT_LIST && e.name().as_ref() == GRANT_ROW.as_bytes() {
                    spans.push((before, reader.buffer_position() as usize));
                }
            }
            Event::End(_) => {
                path.pop();
                if path.len() == 2 {
                    if let Some(start) = open_row.take() {
                        spans.push((start, reader.buffer_position() as usize));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(spans)
}

/// Read every permission row of the module document `xml`.
pub fn parse_grant_rows(xml: &str) -> Result<Vec<GrantRow>, MergeError> {
    let spans = grant_row_spans(xml).map_err(quick_xml::DeError::from)?;
    let rows = spans
        .into_iter()
        .enumerate()
        .map(|(position, (start, end))| {
            match quick_xml::de::from_str::<PermissionGrant>(&xml[start..end]) {
                Ok(grant) => GrantRow::Parsed(grant),
                Err(e) => GrantRow::Unreadable {
                    position,
                    error: e.to_string(),
                },
            }
        })
        .collect();
    Ok(rows)
}

fn overwrite<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// Copy the fields present in `doc` onto `module`.
pub fn apply_fields(module: &mut ModuleInfo, doc: &ModuleDocument) {
    overwrite(&mut module.title, &doc.title);
    overwrite(&mut module.header, &doc.header);
    overwrite(&mut module.footer, &doc.footer);
    overwrite(&mut module.alignment, &doc.alignment);
    overwrite(&mut module.color, &doc.color);
    overwrite(&mut module.border, &doc.border);
    overwrite(&mut module.icon_file, &doc.icon_file);
    overwrite(&mut module.cache_time, &doc.cache_time);
    overwrite(&mut module.container_src, &doc.container_src);
    overwrite(&mut module.display_title, &doc.display_title);
    overwrite(&mut module.display_print, &doc.display_print);
    overwrite(&mut module.inherit_view_permissions, &doc.inherit_view_permissions);
    if doc.start_date.is_some() {
        module.start_date = doc.start_date;
    }
    if doc.end_date.is_some() {
        module.end_date = doc.end_date;
    }
}

/// Merge the module document `xml` into `module`. Returns the grant rows that
/// could not be applied.
pub async fn merge_module<S: ImportStore>(
    store: &S,
    module: &ModuleInfo,
    xml: &str,
) -> Result<Vec<GrantWarning>, MergeError> {
    let doc = parse_module_document(xml)?;

    let mut merged = module.clone();
    apply_fields(&mut merged, &doc);
    if merged != *module {
        store.update_module(&merged).await?;
    }

    for setting in doc.module_settings.items.iter().filter(|s| !s.name.is_empty()) {
        store
            .upsert_module_setting(module.module_id, &setting.name, &setting.value)
            .await?;
    }
    for setting in doc.tab_module_settings.items.iter().filter(|s| !s.name.is_empty()) {
        store
            .upsert_tab_module_setting(module.tab_module_id, &setting.name, &setting.value)
            .await?;
    }

    let mut warnings = Vec::new();
    let mut grants = Vec::new();
    for row in parse_grant_rows(xml)? {
        match row {
            GrantRow::Parsed(grant) => grants.push(grant),
            GrantRow::Unreadable { position, error } => {
                warnings.push(GrantWarning::unreadable(position, error));
            }
        }
    }
    let row_count = grants.len() + warnings.len();
    warnings.extend(apply_grants(store, &merged, &grants).await?);
    log::debug!(
        "Merged module document into module {} ({} settings, {} grants, {} dropped)",
        module.module_id,
        doc.module_settings.items.len() + doc.tab_module_settings.items.len(),
        row_count,
        warnings.len()
    );
    Ok(warnings)
}
