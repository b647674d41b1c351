//! Module content handlers ("portable" modules).
//!
//! A module package that can move its content between portals ships a handler
//! registered under the package's business controller name. Handlers only
//! deal with the raw-content format; structured module documents never reach
//! them.

use std::fmt;

use async_trait::async_trait;

use crate::store::StoreError;

pub mod html;
pub mod registry;

pub use registry::{HandlerRegistry, ResolveError};

#[derive(Debug)]
pub enum HandlerError {
    Construction(String),
    InvalidContent(String),
    Store(StoreError),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Construction(e) => write!(f, "Handler construction failed: {e}"),
            HandlerError::InvalidContent(e) => write!(f, "Invalid module content: {e}"),
            HandlerError::Store(e) => write!(f, "Handler storage error: {e}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        HandlerError::Store(e)
    }
}

impl From<sqlx::Error> for HandlerError {
    fn from(e: sqlx::Error) -> Self {
        HandlerError::Store(StoreError::Db(e))
    }
}

/// Produce and consume a module instance's raw content fragment.
#[async_trait]
pub trait Portable: Send + Sync {
    /// The inner XML of a `<content>` export for `module_id`.
    async fn export_module(&self, module_id: i64) -> Result<String, HandlerError>;

    /// Replace the content of `module_id` with `content`, an inner-XML fragment
    /// produced by `export_module` of a handler at `version`.
    async fn import_module(
        &self,
        module_id: i64,
        content: &str,
        version: &str,
        user_id: i64,
    ) -> Result<(), HandlerError>;
}
