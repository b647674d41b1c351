use std::fmt;

use crate::portable::ResolveError;

/// Terminal failure of one import attempt. Each kind maps to exactly one
/// operator-visible message key; detail stays in the server log. Access
/// denial is settled before dispatch, see `AppError::AccessDenied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportError {
    ImportNotSupported,
    NotValidXml,
    NotCorrectType,
    HandlerResolution,
    Error,
}

impl ImportError {
    pub fn message_key(&self) -> &'static str {
        match self {
            ImportError::ImportNotSupported => "ImportNotSupported",
            ImportError::NotValidXml => "NotValidXml",
            ImportError::NotCorrectType => "NotCorrectType",
            // Operators see the generic message for both.
            ImportError::HandlerResolution | ImportError::Error => "Error",
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::ImportNotSupported => write!(f, "module does not support import"),
            ImportError::NotValidXml => write!(f, "document is not valid XML"),
            ImportError::NotCorrectType => write!(f, "document type does not match module"),
            ImportError::HandlerResolution => write!(f, "content handler could not be created"),
            ImportError::Error => write!(f, "import failed"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<ResolveError> for ImportError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotPortable | ResolveError::ImportNotSupported => {
                ImportError::ImportNotSupported
            }
            ResolveError::HandlerResolution(detail) => {
                log::error!("Content handler resolution failed: {detail}");
                ImportError::HandlerResolution
            }
        }
    }
}
