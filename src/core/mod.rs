// src/core/mod.rs
//! Core services shared by the web layer and the admin CLI

pub mod ai_client;
pub mod config_manager;
pub mod database;
pub mod fs_ops;
pub mod prompts;

pub use ai_client::AiClient;
pub use config_manager::ConfigManager;
pub use database::Database;
pub use fs_ops::FsOps;
