pub mod import_handlers;
