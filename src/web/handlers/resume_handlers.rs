// src/web/handlers/resume_handlers.rs
use crate::auth::AuthenticatedUser;
use crate::core::database::{Database, ResumePatch, ResumeRepository, ResumeSummary};
use crate::template_system::TemplateId;
use crate::types::ResumeData;
use crate::web::error::ApiError;
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

fn template_from_request(id: Option<i64>) -> Result<Option<TemplateId>, ApiError> {
    match id {
        None => Ok(None),
        Some(raw) => TemplateId::from_id(raw)
            .map(Some)
            .ok_or_else(|| ApiError::invalid_template(raw)),
    }
}

fn repository<'a>(database: &'a Database, config: &ServerConfig) -> ResumeRepository<'a> {
    ResumeRepository::new(database.pool(), config.max_resumes_per_user)
}

pub async fn list_resumes_handler(
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<Vec<ResumeSummary>>>, ApiError> {
    let resumes = repository(database, config).get_resumes(auth.id()).await?;

    Ok(Json(DataResponse::success(
        format!("Found {} resumes", resumes.len()),
        resumes,
    )))
}

pub async fn save_resume_handler(
    request: Json<SaveResumeRequest>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<ResumeView>>, ApiError> {
    let request = request.into_inner();
    let template = template_from_request(request.template_id)?.unwrap_or_default();
    let data = ResumeData::from_value(request.data).map_err(ApiError::invalid_resume_data)?;

    let resume = repository(database, config)
        .save_resume(auth.id(), request.title.as_deref(), template, &data)
        .await?;

    info!(
        "User {} created resume {} ({} template)",
        auth.email(),
        resume.id,
        template.slug()
    );

    Ok(Json(DataResponse::success(
        "Resume saved",
        ResumeView::from(resume),
    )))
}

pub async fn get_resume_handler(
    id: &str,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<ResumeView>>, ApiError> {
    let resume = repository(database, config).get_resume(auth.id(), id).await?;
    Ok(Json(DataResponse::success(
        "Resume loaded",
        ResumeView::from(resume),
    )))
}

pub async fn update_resume_handler(
    id: &str,
    request: Json<UpdateResumeRequest>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<ResumeView>>, ApiError> {
    let request = request.into_inner();

    let patch = ResumePatch {
        title: request.title,
        template_id: template_from_request(request.template_id)?,
        data: request
            .data
            .map(ResumeData::from_value)
            .transpose()
            .map_err(ApiError::invalid_resume_data)?,
    };

    let resume = repository(database, config)
        .update_resume(auth.id(), id, patch)
        .await?;

    Ok(Json(DataResponse::success(
        "Resume updated",
        ResumeView::from(resume),
    )))
}

pub async fn delete_resume_handler(
    id: &str,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<ActionResponse>, ApiError> {
    repository(database, config)
        .delete_resume(auth.id(), id)
        .await?;

    info!("User {} deleted resume {}", auth.email(), id);

    Ok(Json(ActionResponse::success(
        format!("Resume '{}' deleted", id),
        "deleted",
    )))
}
