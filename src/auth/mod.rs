pub mod csrf;
pub mod module_access;
pub mod session;
