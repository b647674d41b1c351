//! One import attempt, from submitted text to a single outcome.
//!
//! Gates run in order and the first failure ends the attempt:
//! document parse, type match, then either the module's content handler
//! (raw `<content>` documents) or the generic module merge (everything else).
//! The edit-permission check happens before the dispatcher is entered.

use serde::Serialize;

use super::document::{DocumentBody, parse_document};
use super::error::ImportError;
use super::grants::GrantWarning;
use super::structured::merge_module;
use crate::models::module::ModuleInfo;
use crate::portable::HandlerRegistry;
use crate::store::ImportStore;

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// A submitted import, discarded once the outcome is known.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub module_id: i64,
    pub raw_document_text: String,
    pub requesting_user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPath {
    Legacy,
    Structured,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub path: ImportPath,
    pub warnings: Vec<GrantWarning>,
}

pub struct ImportDispatcher<'a, S> {
    store: &'a S,
    registry: &'a HandlerRegistry,
    max_document_bytes: usize,
}

impl<'a, S: ImportStore> ImportDispatcher<'a, S> {
    pub fn new(store: &'a S, registry: &'a HandlerRegistry) -> Self {
        Self {
            store,
            registry,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }

    pub fn with_max_document_bytes(mut self, max: usize) -> Self {
        self.max_document_bytes = max;
        self
    }

    /// Import `request` into `module`, the already-authorized target.
    pub async fn dispatch(
        &self,
        module: &ModuleInfo,
        request: &ImportRequest,
    ) -> Result<ImportReport, ImportError> {
        if request.raw_document_text.len() > self.max_document_bytes {
            log::warn!(
                "Rejected import into module {}: {} bytes exceeds limit of {}",
                module.module_id,
                request.raw_document_text.len(),
                self.max_document_bytes
            );
            return Err(ImportError::NotValidXml);
        }

        let doc = parse_document(&request.raw_document_text).map_err(|e| {
            log::info!("Rejected import into module {}: {}", module.module_id, e);
            ImportError::NotValidXml
        })?;

        if !module.desktop_module.accepts_type(&doc.doc_type) {
            log::info!(
                "Rejected import into module {}: document type '{}' is not {} or {}",
                module.module_id,
                doc.doc_type,
                module.desktop_module.canonical_module_name(),
                module.desktop_module.canonical_friendly_name()
            );
            return Err(ImportError::NotCorrectType);
        }

        let report = match doc.body {
            DocumentBody::LegacyFragment { inner_xml } => {
                let handler = self.registry.resolve(&module.desktop_module)?;
                handler
                    .import_module(
                        module.module_id,
                        &inner_xml,
                        &doc.version,
                        request.requesting_user_id,
                    )
                    .await
                    .map_err(|e| {
                        log::error!("Content import into module {} failed: {}", module.module_id, e);
                        ImportError::Error
                    })?;
                ImportReport {
                    path: ImportPath::Legacy,
                    warnings: Vec::new(),
                }
            }
            DocumentBody::Structured { xml } => {
                let warnings = merge_module(self.store, module, &xml).await.map_err(|e| {
                    log::error!("Module merge into module {} failed: {}", module.module_id, e);
                    ImportError::Error
                })?;
                ImportReport {
                    path: ImportPath::Structured,
                    warnings,
                }
            }
        };

        log::info!(
            "Imported {:?} document into module {} by user {} ({} grants dropped)",
            report.path,
            module.module_id,
            request.requesting_user_id,
            report.warnings.len()
        );
        Ok(report)
    }
}
