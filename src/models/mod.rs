pub mod file;
pub mod module;
pub mod permission_grant;
pub mod principal;
pub mod xml_field;
