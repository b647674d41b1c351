use super::dispatcher::ImportReport;
use super::error::ImportError;

/// How a message is styled on the import page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Info,
}

impl Severity {
    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Error => "alert-error",
            Severity::Info => "alert-info",
        }
    }
}

/// What the import page does after one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Redirect(String),
    Message { text: String, severity: Severity },
}

impl ImportOutcome {
    pub fn from_result(result: &Result<ImportReport, ImportError>, return_url: &str) -> Self {
        match result {
            Ok(_) => ImportOutcome::Redirect(return_url.to_string()),
            Err(e) => ImportOutcome::Message {
                text: message_text(e.message_key()).to_string(),
                severity: Severity::Error,
            },
        }
    }
}

/// Display text for a message key. Unknown keys fall back to the generic error.
pub fn message_text(key: &str) -> &'static str {
    match key {
        "ImportNotSupported" => "This module does not support importing content.",
        "NotValidXml" => "The content is not a valid XML document.",
        "NotCorrectType" => "The content was exported from a different type of module.",
        "ImportWarnings" => "Import completed. Some permissions could not be applied:",
        _ => "An error occurred while importing the module content.",
    }
}
