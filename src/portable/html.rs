//! Content handler for the built-in HTML text module.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use sqlx::PgPool;

use super::{HandlerError, HandlerRegistry, Portable};

pub const HTML_CONTROLLER: &str = "Portal.Modules.Html.HtmlTextController";

const HTML_ELEMENT: &[u8] = b"htmltext";

pub struct HtmlTextContent {
    pool: PgPool,
}

impl HtmlTextContent {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register the handler under its controller name.
    pub fn register(registry: &mut HandlerRegistry, pool: PgPool) {
        registry.register(HTML_CONTROLLER, move || {
            Ok(Box::new(HtmlTextContent::new(pool.clone())) as Box<dyn Portable>)
        });
    }
}

/// The HTML carried by a fragment: the text of its `<htmltext>` element, or the
/// fragment itself when it has none.
pub fn extract_html(fragment: &str) -> Result<String, HandlerError> {
    let mut reader = Reader::from_str(fragment);
    let mut inside = false;
    let mut found = false;
    let mut html = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == HTML_ELEMENT => {
                inside = true;
                found = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == HTML_ELEMENT => inside = false,
            Ok(Event::Text(t)) if inside => {
                let text = t
                    .unescape()
                    .map_err(|e| HandlerError::InvalidContent(e.to_string()))?;
                html.push_str(&text);
            }
            Ok(Event::CData(c)) if inside => {
                html.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(HandlerError::InvalidContent(e.to_string())),
        }
    }

    Ok(if found { html } else { fragment.to_string() })
}

/// Wrap `html` as a fragment `extract_html` reads back unchanged.
pub fn wrap_html(html: &str) -> String {
    let body = html.replace("]]>", "]]]]><![CDATA[>");
    format!("<htmltext><![CDATA[{body}]]></htmltext>")
}

#[async_trait]
impl Portable for HtmlTextContent {
    async fn export_module(&self, module_id: i64) -> Result<String, HandlerError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT content FROM module_content WHERE module_id = $1")
                .bind(module_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(wrap_html(&row.map(|r| r.0).unwrap_or_default()))
    }

    async fn import_module(
        &self,
        module_id: i64,
        content: &str,
        version: &str,
        user_id: i64,
    ) -> Result<(), HandlerError> {
        let html = extract_html(content)?;
        sqlx::query(
            "INSERT INTO module_content (module_id, content, version, updated_by, updated_on) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (module_id) DO UPDATE \
             SET content = EXCLUDED.content, version = EXCLUDED.version, \
                 updated_by = EXCLUDED.updated_by, updated_on = EXCLUDED.updated_on",
        )
        .bind(module_id)
        .bind(&html)
        .bind(version)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        log::debug!("Imported {} bytes of HTML into module {}", html.len(), module_id);
        Ok(())
    }
}
