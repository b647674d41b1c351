//! Module content import.

pub mod canonical;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod files;
pub mod grants;
pub mod outcome;
pub mod structured;

pub use dispatcher::{ImportDispatcher, ImportPath, ImportReport, ImportRequest};
pub use error::ImportError;
pub use outcome::{ImportOutcome, Severity};
