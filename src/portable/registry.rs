use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::{HandlerError, Portable};
use crate::models::module::DesktopModule;

/// Builds a fresh handler for one import attempt.
pub type HandlerFactory = Arc<dyn Fn() -> Result<Box<dyn Portable>, HandlerError> + Send + Sync>;

#[derive(Debug)]
pub enum ResolveError {
    /// The package names no controller or is not flagged portable.
    NotPortable,
    /// The named controller has no registered handler.
    ImportNotSupported,
    /// The factory failed or panicked.
    HandlerResolution(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotPortable => write!(f, "module package is not portable"),
            ResolveError::ImportNotSupported => write!(f, "no content handler registered"),
            ResolveError::HandlerResolution(e) => write!(f, "content handler failed to start: {e}"),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Content handlers by business controller name, filled at startup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, business_controller: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn Portable>, HandlerError> + Send + Sync + 'static,
    {
        self.factories
            .insert(business_controller.into(), Arc::new(factory));
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// A new handler for the package `desktop`. Nothing is cached between calls.
    pub fn resolve(&self, desktop: &DesktopModule) -> Result<Box<dyn Portable>, ResolveError> {
        let controller = desktop
            .business_controller
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let controller = match controller {
            Some(c) if desktop.is_portable => c,
            _ => return Err(ResolveError::NotPortable),
        };

        let factory = self
            .factories
            .get(controller)
            .ok_or(ResolveError::ImportNotSupported)?;

        match catch_unwind(AssertUnwindSafe(|| factory())) {
            Ok(Ok(handler)) => Ok(handler),
            Ok(Err(e)) => Err(ResolveError::HandlerResolution(e.to_string())),
            Err(_) => Err(ResolveError::HandlerResolution(format!(
                "constructor for {controller} panicked"
            ))),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("controllers", &names)
            .finish()
    }
}
