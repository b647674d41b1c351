use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use crate::audit::{self, AuditLog};
use crate::auth::csrf;
use crate::auth::module_access::has_module_edit_access;
use crate::auth::session::{get_permissions, get_user_id, set_flash, take_flash};
use crate::errors::{AppError, render};
use crate::import::files::{list_export_files, read_export_file};
use crate::import::grants::GrantWarning;
use crate::import::outcome::message_text;
use crate::import::{ImportDispatcher, ImportOutcome, ImportRequest, Severity};
use crate::models::module::{ModuleInfo, NO_MODULE_ID};
use crate::portable::HandlerRegistry;
use crate::store::{FileStore, ImportStore, ModuleStore, PrincipalDirectory};
use crate::templates_structs::ImportTemplate;

/// Settings the import routes read per request.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub access_denied_url: String,
    pub default_return_url: String,
    pub max_document_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub moduleid: Option<String>,
    pub tabid: Option<String>,
    pub returnurl: Option<String>,
}

impl ImportQuery {
    pub fn module_id(&self) -> i64 {
        parse_module_id(self.moduleid.as_deref())
    }

    pub fn tab_id(&self) -> Option<i64> {
        self.tabid.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportForm {
    pub csrf_token: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FilesQuery {
    pub moduleid: Option<String>,
    pub folder_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub moduleid: Option<String>,
    pub file_id: Option<i64>,
}

/// Module id from the query string; absent or unparsable yields the sentinel.
pub fn parse_module_id(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(NO_MODULE_ID)
}

/// `raw` when it is a site-relative path, else `default`.
pub fn safe_return_url(raw: Option<&str>, default: &str) -> String {
    match raw.map(str::trim) {
        Some(url) if is_site_relative(url) => url.to_string(),
        _ => default.to_string(),
    }
}

fn is_site_relative(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.starts_with("/\\")
        && !url.contains("://")
        && !url.chars().any(|c| c.is_control())
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

struct Authorized {
    module: ModuleInfo,
    user_id: i64,
}

/// Load the target module and run the edit-permission gate. A refusal is
/// `AppError::AccessDenied`, which redirects to the configured denial page.
async fn authorize<S>(
    store: &S,
    settings: &ImportSettings,
    session: &Session,
    module_id: i64,
    tab_id: Option<i64>,
) -> Result<Authorized, AppError>
where
    S: ModuleStore + PrincipalDirectory,
{
    let module = if module_id == NO_MODULE_ID {
        None
    } else {
        store.get_module(module_id, tab_id).await?
    };
    let user_id = get_user_id(session);
    let permissions = get_permissions(session);

    let denied = || {
        log::warn!("Import access denied: module {module_id}, user {user_id:?}");
        AppError::AccessDenied(settings.access_denied_url.clone())
    };
    if !has_module_edit_access(store, module.as_ref(), user_id, &permissions).await? {
        return Err(denied());
    }
    match (module, user_id) {
        (Some(module), Some(user_id)) => Ok(Authorized { module, user_id }),
        _ => Err(denied()),
    }
}

async fn render_form<S: FileStore>(
    store: &S,
    session: &Session,
    module: &ModuleInfo,
    return_url: String,
    content: String,
    message: Option<(String, Severity)>,
) -> Result<HttpResponse, AppError> {
    let folders = store.folders(module.portal_id).await?;
    let (message, severity_class) = match message {
        Some((text, severity)) => (Some(text), severity.css_class()),
        None => (None, Severity::Info.css_class()),
    };
    render(ImportTemplate {
        module_id: module.module_id,
        module_title: module.title.clone(),
        csrf_token: csrf::get_or_create_token(session),
        flash: take_flash(session),
        return_url,
        folders,
        content,
        message,
        severity_class: severity_class.to_string(),
    })
}

fn warning_summary(warnings: &[GrantWarning]) -> String {
    let reasons: Vec<&str> = warnings.iter().map(|w| w.reason.as_str()).collect();
    format!("{} {}", message_text("ImportWarnings"), reasons.join("; "))
}

pub async fn form<S>(
    store: web::Data<S>,
    settings: web::Data<ImportSettings>,
    session: Session,
    query: web::Query<ImportQuery>,
) -> Result<HttpResponse, AppError>
where
    S: ImportStore + FileStore + 'static,
{
    let access = authorize(store.get_ref(), &settings, &session, query.module_id(), query.tab_id()).await?;
    let return_url = safe_return_url(query.returnurl.as_deref(), &settings.default_return_url);
    render_form(store.get_ref(), &session, &access.module, return_url, String::new(), None).await
}

pub async fn submit<S>(
    store: web::Data<S>,
    registry: web::Data<HandlerRegistry>,
    settings: web::Data<ImportSettings>,
    session: Session,
    query: web::Query<ImportQuery>,
    form: web::Form<ImportForm>,
) -> Result<HttpResponse, AppError>
where
    S: ImportStore + FileStore + AuditLog + 'static,
{
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let Authorized { module, user_id } =
        authorize(store.get_ref(), &settings, &session, query.module_id(), query.tab_id()).await?;
    let return_url = safe_return_url(query.returnurl.as_deref(), &settings.default_return_url);

    let request = ImportRequest {
        module_id: module.module_id,
        raw_document_text: form.into_inner().content,
        requesting_user_id: user_id,
    };
    let dispatcher = ImportDispatcher::new(store.get_ref(), registry.get_ref())
        .with_max_document_bytes(settings.max_document_bytes);
    let result = dispatcher.dispatch(&module, &request).await;

    if let Ok(report) = &result {
        let details = serde_json::json!({
            "path": report.path,
            "dropped_grants": report.warnings,
            "summary": format!("Imported content into module {}", module.module_id),
        });
        audit::log(store.get_ref(), user_id, "module.import", "module", module.module_id, details).await;
        if !report.warnings.is_empty() {
            // Read back under `FLASH_KEY` by the return page.
            set_flash(&session, &warning_summary(&report.warnings));
        }
    }

    match ImportOutcome::from_result(&result, &return_url) {
        ImportOutcome::Redirect(url) => Ok(see_other(&url)),
        ImportOutcome::Message { text, severity } => {
            render_form(
                store.get_ref(),
                &session,
                &module,
                return_url,
                request.raw_document_text,
                Some((text, severity)),
            )
            .await
        }
    }
}

/// File picker entries for a folder, as JSON.
pub async fn files<S>(
    store: web::Data<S>,
    settings: web::Data<ImportSettings>,
    session: Session,
    query: web::Query<FilesQuery>,
) -> Result<HttpResponse, AppError>
where
    S: ImportStore + FileStore + 'static,
{
    let module_id = parse_module_id(query.moduleid.as_deref());
    let access = authorize(store.get_ref(), &settings, &session, module_id, None).await?;
    let options = match query.folder_id {
        Some(folder_id) => {
            list_export_files(
                store.get_ref(),
                access.module.portal_id,
                &access.module.desktop_module,
                folder_id,
            )
            .await?
        }
        None => Vec::new(),
    };
    Ok(HttpResponse::Ok().json(options))
}

/// Text of one export file, for pre-filling the document box.
pub async fn file_content<S>(
    store: web::Data<S>,
    settings: web::Data<ImportSettings>,
    session: Session,
    query: web::Query<FileQuery>,
) -> Result<HttpResponse, AppError>
where
    S: ImportStore + FileStore + 'static,
{
    let module_id = parse_module_id(query.moduleid.as_deref());
    let access = authorize(store.get_ref(), &settings, &session, module_id, None).await?;
    let text = match query.file_id {
        Some(file_id) => read_export_file(store.get_ref(), access.module.portal_id, file_id).await,
        None => String::new(),
    };
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(text))
}

/// Register the import routes for storage backend `S`.
pub fn configure<S>(cfg: &mut web::ServiceConfig)
where
    S: ImportStore + FileStore + AuditLog + 'static,
{
    cfg.route("/modules/import", web::get().to(form::<S>))
        .route("/modules/import", web::post().to(submit::<S>))
        .route("/modules/import/files", web::get().to(files::<S>))
        .route("/modules/import/file", web::get().to(file_content::<S>));
}
