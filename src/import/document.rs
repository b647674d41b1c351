//! Parsing of submitted export documents.
//!
//! The parser never resolves entities or DTDs. A DOCTYPE carrying an internal
//! subset or an external identifier is rejected outright, and any entity
//! reference other than the five predefined ones fails to unescape.

use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Root tag (compared case-insensitively) of documents in the raw-content format.
pub const LEGACY_ROOT: &str = "content";

/// The payload of a document, decided once from the root tag.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    /// Inner XML of a `<content>` root, handed verbatim to the module's handler.
    LegacyFragment { inner_xml: String },
    /// A self-describing module document (the whole sanitized text).
    Structured { xml: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDocument {
    pub root_name: String,
    /// Value of the root `type` attribute, empty when absent.
    pub doc_type: String,
    /// Value of the root `version` attribute, empty when absent.
    pub version: String,
    pub body: DocumentBody,
}

impl ImportDocument {
    pub fn is_legacy(&self) -> bool {
        matches!(self.body, DocumentBody::LegacyFragment { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentError {
    Empty,
    Malformed(String),
    ForbiddenDoctype,
    MultipleRoots,
    ContentOutsideRoot,
    Unclosed,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::Empty => write!(f, "document has no root element"),
            DocumentError::Malformed(e) => write!(f, "malformed XML: {e}"),
            DocumentError::ForbiddenDoctype => {
                write!(f, "DOCTYPE with entity declarations or external identifiers")
            }
            DocumentError::MultipleRoots => write!(f, "more than one root element"),
            DocumentError::ContentOutsideRoot => write!(f, "text outside the root element"),
            DocumentError::Unclosed => write!(f, "unclosed element at end of document"),
        }
    }
}

impl std::error::Error for DocumentError {}

fn is_valid_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Drop characters that XML 1.0 does not allow anywhere in a document.
pub fn strip_invalid_xml_chars(text: &str) -> String {
    text.chars().filter(|c| is_valid_xml_char(*c)).collect()
}

fn malformed(e: impl fmt::Display) -> DocumentError {
    DocumentError::Malformed(e.to_string())
}

/// A DOCTYPE is tolerated only as a bare name, e.g. `<!DOCTYPE module>`.
fn doctype_is_forbidden(decl: &str) -> bool {
    if decl.contains('[') {
        return true;
    }
    decl.split_whitespace()
        .any(|token| token.eq_ignore_ascii_case("SYSTEM") || token.eq_ignore_ascii_case("PUBLIC"))
}

fn check_attributes(e: &BytesStart<'_>) -> Result<(), DocumentError> {
    for attr in e.attributes() {
        let attr = attr.map_err(malformed)?;
        attr.unescape_value().map_err(malformed)?;
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<String, DocumentError> {
    match e.try_get_attribute(name).map_err(malformed)? {
        Some(attr) => Ok(attr.unescape_value().map_err(malformed)?.into_owned()),
        None => Ok(String::new()),
    }
}

struct Root {
    name: String,
    doc_type: String,
    version: String,
    inner_start: usize,
    inner_end: Option<usize>,
}

impl Root {
    fn from_start(e: &BytesStart<'_>, inner_start: usize) -> Result<Self, DocumentError> {
        Ok(Root {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            doc_type: attribute(e, "type")?,
            version: attribute(e, "version")?,
            inner_start,
            inner_end: None,
        })
    }
}

/// Sanitize and parse a submitted document.
pub fn parse_document(raw: &str) -> Result<ImportDocument, DocumentError> {
    let text = strip_invalid_xml_chars(raw);
    let mut reader = Reader::from_str(&text);
    reader.config_mut().check_end_names = true;

    let mut depth: usize = 0;
    let mut root: Option<Root> = None;

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::DocType(decl)) => {
                if root.is_some() {
                    return Err(malformed("DOCTYPE after root element"));
                }
                if doctype_is_forbidden(&String::from_utf8_lossy(&decl)) {
                    return Err(DocumentError::ForbiddenDoctype);
                }
            }
            Ok(Event::Start(e)) => {
                check_attributes(&e)?;
                if depth == 0 {
                    if root.is_some() {
                        return Err(DocumentError::MultipleRoots);
                    }
                    root = Some(Root::from_start(&e, reader.buffer_position() as usize)?);
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                check_attributes(&e)?;
                if depth == 0 {
                    if root.is_some() {
                        return Err(DocumentError::MultipleRoots);
                    }
                    let end = reader.buffer_position() as usize;
                    let mut r = Root::from_start(&e, end)?;
                    r.inner_end = Some(end);
                    root = Some(r);
                }
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return Err(malformed("end tag without start tag"));
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(r) = root.as_mut() {
                        r.inner_end = Some(before);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if depth == 0 {
                    if !t.iter().all(|b| b.is_ascii_whitespace()) {
                        return Err(DocumentError::ContentOutsideRoot);
                    }
                } else {
                    t.unescape().map_err(malformed)?;
                }
            }
            Ok(Event::CData(_)) if depth == 0 => return Err(DocumentError::ContentOutsideRoot),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(e)),
        }
    }

    if depth != 0 {
        return Err(DocumentError::Unclosed);
    }
    let root = root.ok_or(DocumentError::Empty)?;
    let inner_end = root.inner_end.ok_or(DocumentError::Unclosed)?;

    let body = if root.name.eq_ignore_ascii_case(LEGACY_ROOT) {
        DocumentBody::LegacyFragment {
            inner_xml: text[root.inner_start..inner_end].to_string(),
        }
    } else {
        DocumentBody::Structured { xml: text.clone() }
    };

    Ok(ImportDocument {
        root_name: root.name,
        doc_type: root.doc_type,
        version: root.version,
        body,
    })
}
