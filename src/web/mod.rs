// src/web/mod.rs

pub mod error;
pub mod handlers;
pub mod types;

pub use error::ApiError;
pub use types::*;

use crate::auth::{AuthConfig, AuthFailure, AuthenticatedUser, OptionalAuth};
use crate::core::database::{Database, ResumeSummary};
use crate::core::{AiClient, ConfigManager};
use crate::generator::ResumeExporter;
use crate::template_system::TemplateInfo;
use crate::types::response::{GenerationRequest, GenerationResult};
use anyhow::{Context, Result};
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket::{
    catchers, delete, get, options, post, put, routes, Build, Request, Response, Rocket, State,
};
use tracing::{info, info_span, Instrument};

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Authorization, Content-Type",
        ));
        response.set_header(Header::new(
            "Access-Control-Expose-Headers",
            "Content-Disposition",
        ));
    }
}

/// Everything the routes need, built once at startup (or per test)
pub struct AppState {
    pub database: Database,
    pub auth: AuthConfig,
    pub ai: AiClient,
    pub exporter: ResumeExporter,
    pub server: ServerConfig,
}

// ===== System =====

#[get("/")]
pub async fn api_index() -> Json<TextResponse> {
    handlers::api_index_handler().await
}

#[get("/health")]
pub async fn health(
    auth: OptionalAuth,
    database: &State<Database>,
    ai: &State<AiClient>,
) -> Result<Json<DataResponse<HealthInfo>>, ApiError> {
    handlers::health_handler(auth, database, ai).await
}

#[get("/me")]
pub async fn get_current_user(
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<UserInfo>>, ApiError> {
    handlers::get_current_user_handler(auth, database, config).await
}

#[post("/auth/signout")]
pub async fn sign_out(
    auth: AuthenticatedUser,
    database: &State<Database>,
) -> Result<Json<ActionResponse>, ApiError> {
    handlers::sign_out_handler(auth, database).await
}

#[get("/templates")]
pub async fn get_templates() -> Json<DataResponse<Vec<TemplateInfo>>> {
    handlers::get_templates_handler().await
}

// ===== Resumes =====

#[get("/resumes")]
pub async fn list_resumes(
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<Vec<ResumeSummary>>>, ApiError> {
    handlers::list_resumes_handler(auth, database, config).await
}

#[post("/resumes", data = "<request>")]
pub async fn save_resume(
    request: Json<SaveResumeRequest>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<ResumeView>>, ApiError> {
    let span = info_span!("save_resume", user = %auth.id());
    handlers::save_resume_handler(request, auth, database, config)
        .instrument(span)
        .await
}

#[get("/resumes/<id>")]
pub async fn get_resume(
    id: &str,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<ResumeView>>, ApiError> {
    handlers::get_resume_handler(id, auth, database, config).await
}

#[put("/resumes/<id>", data = "<request>")]
pub async fn update_resume(
    id: &str,
    request: Json<UpdateResumeRequest>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<ResumeView>>, ApiError> {
    let span = info_span!("update_resume", user = %auth.id(), resume = %id);
    handlers::update_resume_handler(id, request, auth, database, config)
        .instrument(span)
        .await
}

#[delete("/resumes/<id>")]
pub async fn delete_resume(
    id: &str,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<ActionResponse>, ApiError> {
    handlers::delete_resume_handler(id, auth, database, config).await
}

// ===== Rendering and download =====

#[get("/resumes/<id>/template?<template>&<print>")]
pub async fn render_resume(
    id: &str,
    template: Option<&str>,
    print: Option<&str>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<RawHtml<String>, ApiError> {
    handlers::render_resume_handler(id, template, print, auth, database, config).await
}

#[post("/preview?<template>&<print>", data = "<request>")]
pub async fn preview(
    request: Json<PreviewRequest>,
    template: Option<&str>,
    print: Option<&str>,
    auth: AuthenticatedUser,
) -> Result<RawHtml<String>, ApiError> {
    handlers::preview_handler(request, template, print, auth).await
}

#[get("/resumes/<id>/download?<format>")]
pub async fn download_resume(
    id: &str,
    format: Option<&str>,
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
    exporter: &State<ResumeExporter>,
) -> Result<FileResponse, ApiError> {
    let span = info_span!("download_resume", user = %auth.id(), resume = %id);
    handlers::download_handler(id, format, auth, database, config, exporter)
        .instrument(span)
        .await
}

// ===== AI proxy =====

#[post("/generate", data = "<request>")]
pub async fn generate(
    request: Json<GenerationRequest>,
    auth: AuthenticatedUser,
    ai: &State<AiClient>,
) -> Result<Json<DataResponse<GenerationResult>>, ApiError> {
    let span = info_span!("generate", user = %auth.id(), kind = request.kind.as_str());
    handlers::generate_handler(request, auth, ai)
        .instrument(span)
        .await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers

fn auth_failure(req: &Request<'_>) -> Option<ApiError> {
    req.local_cache(|| AuthFailure(None)).0.map(ApiError::from)
}

#[rocket::catch(400)]
pub fn bad_request() -> ApiError {
    ApiError::new(
        Status::BadRequest,
        "Invalid request format",
        "BAD_REQUEST",
        &[
            "Check your request JSON format",
            "Verify all required fields are present",
        ],
    )
}

#[rocket::catch(401)]
pub fn unauthorized(req: &Request<'_>) -> ApiError {
    auth_failure(req).unwrap_or_else(|| {
        ApiError::new(
            Status::Unauthorized,
            "Authentication required",
            "MISSING_TOKEN",
            &["Sign in and send the access token as a Bearer header"],
        )
    })
}

#[rocket::catch(404)]
pub fn not_found(req: &Request<'_>) -> ApiError {
    ApiError::new(
        Status::NotFound,
        format!("No route for {} {}", req.method(), req.uri()),
        "NOT_FOUND",
        &["Check the endpoint path"],
    )
}

#[rocket::catch(413)]
pub fn payload_too_large() -> ApiError {
    ApiError::new(
        Status::PayloadTooLarge,
        "Request body is too large",
        "PAYLOAD_TOO_LARGE",
        &["Shorten long descriptions and try again"],
    )
}

#[rocket::catch(422)]
pub fn unprocessable() -> ApiError {
    ApiError::new(
        Status::UnprocessableEntity,
        "Request body does not match the expected shape",
        "UNPROCESSABLE_ENTITY",
        &[
            "Verify field names and value types",
            "For /generate, type must be summary, experience, skills or improve",
        ],
    )
}

#[rocket::catch(500)]
pub fn internal_error(req: &Request<'_>) -> ApiError {
    auth_failure(req).unwrap_or_else(|| ApiError::internal("Internal server error"))
}

/// Assemble the application; `start_web_server` and the integration tests both use this
pub fn build_rocket(figment: rocket::figment::Figment, state: AppState) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(Cors)
        .manage(state.database)
        .manage(state.auth)
        .manage(state.ai)
        .manage(state.exporter)
        .manage(state.server)
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                payload_too_large,
                unprocessable,
                internal_error
            ],
        )
        .mount(
            "/api",
            routes![
                api_index,
                health,
                get_current_user,
                sign_out,
                get_templates,
                list_resumes,
                save_resume,
                get_resume,
                update_resume,
                delete_resume,
                render_resume,
                preview,
                download_resume,
                generate,
                options,
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    config.ensure_directories().await?;

    let database = Database::new(&config.environment.database_path)
        .await
        .context("Failed to initialize database")?;

    let ai = AiClient::new(&config.ai)?;
    if ai.is_configured() {
        info!("AI generation enabled with model {}", ai.model());
    } else {
        info!("AI_API_KEY not set; /api/generate will answer 503");
    }

    let state = AppState {
        database,
        auth: AuthConfig::from_settings(&config.auth),
        ai,
        exporter: ResumeExporter::new(config.environment.output_path.clone()),
        server: ServerConfig {
            max_resumes_per_user: config.server.max_resumes_per_user,
        },
    };

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port))
        .merge((
            "limits",
            Limits::default().limit("json", 2.mebibytes()),
        ));

    info!("Starting resume builder API server");
    info!("Environment: {}", config.environment.name);
    info!("Database: {}", config.environment.database_path.display());
    info!("Listening on {}:{}", config.server.address, config.server.port);

    let _rocket = build_rocket(figment, state)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket server failed: {}", e))?;

    Ok(())
}
