// src/web/handlers/render_handlers.rs
use crate::auth::AuthenticatedUser;
use crate::core::database::{Database, ResumeRepository};
use crate::generator::{ExportFormat, ResumeExporter};
use crate::template_processor::{render_html, RenderOptions};
use crate::template_system::TemplateId;
use crate::types::ResumeData;
use crate::utils::is_truthy;
use crate::web::error::ApiError;
use crate::web::types::*;

use rocket::http::ContentType;
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

/// Template from a query value (id or slug), falling back to the record's own
fn resolve_template(raw: Option<&str>, fallback: TemplateId) -> Result<TemplateId, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(fallback),
        Some(value) => TemplateId::parse(value).ok_or_else(|| ApiError::invalid_template(value)),
    }
}

fn render_options(print: Option<&str>) -> RenderOptions {
    RenderOptions {
        auto_print: print.map(is_truthy).unwrap_or(false),
    }
}

pub async fn render_resume_handler(
    id: &str,
    template: Option<&str>,
    print: Option<&str>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<RawHtml<String>, ApiError> {
    let resume = ResumeRepository::new(database.pool(), config.max_resumes_per_user)
        .get_resume(auth.id(), id)
        .await?;
    let template = resolve_template(template, resume.template_id)?;

    Ok(RawHtml(render_html(
        &resume.data,
        template,
        render_options(print),
    )))
}

/// Render form data that has not been saved yet
pub async fn preview_handler(
    request: Json<PreviewRequest>,
    template: Option<&str>,
    print: Option<&str>,
    auth: AuthenticatedUser,
) -> Result<RawHtml<String>, ApiError> {
    let request = request.into_inner();

    let body_template = match request.template_id {
        Some(raw) => TemplateId::from_id(raw).ok_or_else(|| ApiError::invalid_template(raw))?,
        None => TemplateId::default(),
    };
    let template = resolve_template(template, body_template)?;
    let data = ResumeData::from_value(request.data).map_err(ApiError::invalid_resume_data)?;

    info!("User {} previewing {} template", auth.email(), template.slug());

    Ok(RawHtml(render_html(&data, template, render_options(print))))
}

pub async fn download_handler(
    id: &str,
    format: Option<&str>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
    exporter: &State<ResumeExporter>,
) -> Result<FileResponse, ApiError> {
    let format = match format.map(str::trim).filter(|s| !s.is_empty()) {
        None => ExportFormat::default(),
        Some(raw) => ExportFormat::parse(raw).ok_or_else(|| {
            ApiError::bad_request(
                format!("Unsupported download format: {}", raw),
                "INVALID_FORMAT",
            )
        })?,
    };

    let resume = ResumeRepository::new(database.pool(), config.max_resumes_per_user)
        .get_resume(auth.id(), id)
        .await?;

    let file = exporter
        .export(&resume.data, resume.template_id, format)
        .await?;

    info!(
        "User {} downloaded resume {} as {}",
        auth.email(),
        resume.id,
        format.extension()
    );

    let content_type = match file.format {
        ExportFormat::Html => ContentType::HTML,
        ExportFormat::Json => ContentType::JSON,
        ExportFormat::Pdf => ContentType::PDF,
        ExportFormat::Toml => ContentType::new("application", "toml"),
    };

    Ok(FileResponse {
        data: file.bytes,
        content_type,
        filename: file.filename,
    })
}
