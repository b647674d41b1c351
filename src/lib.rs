//! Module content import for the portal: document validation, content
//! handler dispatch, structured module merge and tab-permission grants.

pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod import;
pub mod models;
pub mod portable;
pub mod store;
pub mod templates_structs;
