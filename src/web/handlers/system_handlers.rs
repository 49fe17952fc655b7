// src/web/handlers/system_handlers.rs
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::database::{Database, ResumeRepository, SessionRepository};
use crate::core::AiClient;
use crate::template_system::{list_templates, TemplateInfo};
use crate::web::error::ApiError;
use crate::web::types::*;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use tracing::{error, info};

pub async fn api_index_handler() -> Json<TextResponse> {
    Json(TextResponse::success(format!(
        "Resume builder API {}. Sign in and start with GET /api/templates and POST /api/resumes.",
        env!("CARGO_PKG_VERSION")
    )))
}

pub async fn health_handler(
    auth: OptionalAuth,
    database: &State<Database>,
    ai: &State<AiClient>,
) -> Result<Json<DataResponse<HealthInfo>>, ApiError> {
    match &auth.user {
        Some(user) => info!("Health check by authenticated user: {}", user.email()),
        None => info!("Health check by anonymous user"),
    }

    if let Err(e) = database.health_check().await {
        error!("Health check failed: {}", e);
        return Err(ApiError::new(
            Status::ServiceUnavailable,
            "Database is unavailable",
            "SERVICE_UNAVAILABLE",
            &["Try again in a few moments"],
        ));
    }

    Ok(Json(DataResponse::success(
        "OK",
        HealthInfo {
            status: "ok",
            database: "ok",
            ai_configured: ai.is_configured(),
            version: env!("CARGO_PKG_VERSION"),
        },
    )))
}

pub async fn get_current_user_handler(
    auth: AuthenticatedUser,
    database: &State<Database>,
    config: &State<ServerConfig>,
) -> Result<Json<DataResponse<UserInfo>>, ApiError> {
    let resume_count = ResumeRepository::new(database.pool(), config.max_resumes_per_user)
        .count_for_user(auth.id())
        .await?;

    let user = auth.user;
    Ok(Json(DataResponse::success(
        format!("Authenticated as {}", user.email),
        UserInfo {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: auth.claims.role,
            created_at: user.created_at,
            last_seen_at: user.last_seen_at,
            resume_count,
        },
    )))
}

/// Revoke the caller's session until its token would have expired anyway
pub async fn sign_out_handler(
    auth: AuthenticatedUser,
    database: &State<Database>,
) -> Result<Json<ActionResponse>, ApiError> {
    SessionRepository::new(database.pool())
        .revoke(
            &auth.claims.session_key(),
            auth.id(),
            auth.claims.expires_at(),
        )
        .await?;

    info!("User {} signed out", auth.email());

    Ok(Json(
        ActionResponse::success("Signed out successfully", "signed_out")
            .with_next_actions(vec!["Sign in again to continue editing".to_string()]),
    ))
}

pub async fn get_templates_handler() -> Json<DataResponse<Vec<TemplateInfo>>> {
    let templates = list_templates();
    Json(DataResponse::success(
        format!("{} templates available", templates.len()),
        templates,
    ))
}
