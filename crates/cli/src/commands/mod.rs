pub mod analyze;
pub mod build;
pub mod config_cmd;
pub mod discover;
pub mod models;
pub mod session;
