// src/web/handlers/ai_handlers.rs
use crate::auth::AuthenticatedUser;
use crate::core::AiClient;
use crate::types::response::{GenerationRequest, GenerationResult};
use crate::web::error::ApiError;
use crate::web::types::DataResponse;

use rocket::serde::json::Json;
use rocket::State;
use tracing::info;

pub async fn generate_handler(
    request: Json<GenerationRequest>,
    auth: AuthenticatedUser,
    ai: &State<AiClient>,
) -> Result<Json<DataResponse<GenerationResult>>, ApiError> {
    let request = request.into_inner();

    info!(
        "User {} requested AI generation: {}",
        auth.email(),
        request.kind.as_str()
    );

    let result = ai.generate(&request).await?;

    Ok(Json(DataResponse::success(
        format!("Generated {}", request.kind.as_str()),
        result,
    )))
}
