pub mod admin_cli;
pub mod auth;
pub mod core;
pub mod generator;
pub mod template_processor;
pub mod template_system;
pub mod types;
pub mod utils;
pub mod web;

pub use auth::{AuthConfig, AuthenticatedUser, Claims};
pub use core::{AiClient, ConfigManager, Database};
pub use generator::{ExportFormat, ResumeExporter};
pub use template_processor::{render_html, RenderOptions};
pub use template_system::TemplateId;
pub use types::ResumeData;
pub use web::{build_rocket, start_web_server, AppState};
