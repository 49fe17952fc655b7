// src/web/error.rs
//! HTTP error type: the standard error envelope paired with its status

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use tracing::error;

use crate::auth::AuthError;
use crate::core::ai_client::AiError;
use crate::core::database::StoreError;
use crate::generator::ExportError;
use crate::web::types::StandardErrorResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: Status,
    pub body: StandardErrorResponse,
}

impl ApiError {
    pub fn new(status: Status, error: impl Into<String>, code: &str, suggestions: &[&str]) -> Self {
        Self {
            status,
            body: StandardErrorResponse::new(
                error.into(),
                code.to_string(),
                suggestions.iter().map(|s| s.to_string()).collect(),
            ),
        }
    }

    pub fn bad_request(error: impl Into<String>, code: &str) -> Self {
        Self::new(
            Status::BadRequest,
            error,
            code,
            &["Check the request body and query parameters"],
        )
    }

    pub fn invalid_template(raw: impl std::fmt::Display) -> Self {
        Self::new(
            Status::BadRequest,
            format!("Unknown template: {}", raw),
            "INVALID_TEMPLATE",
            &["Use one of the ids returned by GET /api/templates (1, 2 or 3)"],
        )
    }

    pub fn invalid_resume_data(err: serde_json::Error) -> Self {
        Self::new(
            Status::BadRequest,
            format!("Resume data could not be read: {}", err),
            "INVALID_RESUME_DATA",
            &["Send personalInfo, workExperience, education and skills as JSON"],
        )
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(
            Status::InternalServerError,
            error,
            "INTERNAL_ERROR",
            &[
                "Try again in a few moments",
                "Contact support if the problem persists",
            ],
        )
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(self.body)).respond_to(req)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::new(
                Status::NotFound,
                format!("Resume '{}' not found", id),
                "RESUME_NOT_FOUND",
                &["List your resumes with GET /api/resumes"],
            ),
            StoreError::LimitReached(max) => Self::new(
                Status::Conflict,
                format!("You can keep at most {} resumes", max),
                "RESUME_LIMIT_REACHED",
                &["Delete a resume you no longer need"],
            ),
            other => {
                error!("Storage failure: {}", other);
                Self::new(
                    Status::InternalServerError,
                    "Database error occurred",
                    "DATABASE_ERROR",
                    &["Try again in a few moments"],
                )
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let suggestions: &[&str] = match err {
            AuthError::MissingToken | AuthError::InvalidToken => {
                &["Send an 'Authorization: Bearer <token>' header"]
            }
            AuthError::TokenVerificationFailed | AuthError::SessionRevoked => {
                &["Sign in again to get a fresh token"]
            }
            AuthError::DatabaseError => &["Try again in a few moments"],
        };
        Self::new(err.status(), err.to_string(), err.code(), suggestions)
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NotConfigured => Self::new(
                Status::ServiceUnavailable,
                "AI generation is not configured on this server",
                "AI_NOT_CONFIGURED",
                &["Set AI_API_KEY to enable generation", "Write the text manually"],
            ),
            AiError::MissingContext { kind, field } => Self::new(
                Status::BadRequest,
                format!("Generating '{}' requires context: {}", kind, field),
                "MISSING_CONTEXT",
                &["Fill in the related form fields before generating"],
            ),
            other => {
                error!("AI provider failure: {}", other);
                Self::new(
                    Status::BadGateway,
                    "The AI service could not complete the request",
                    "AI_UPSTREAM_ERROR",
                    &["Try again in a few moments"],
                )
            }
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::PdfUnavailable => Self::new(
                Status::ServiceUnavailable,
                "PDF export is not available on this server",
                "PDF_UNAVAILABLE",
                &[
                    "Open the print preview and use the browser's Save as PDF",
                    "Download the HTML version instead",
                ],
            ),
            ExportError::Compile(msg) => {
                error!("PDF compilation failed: {}", msg);
                Self::new(
                    Status::InternalServerError,
                    "PDF generation failed",
                    "PDF_GENERATION_FAILED",
                    &["Try the print preview instead"],
                )
            }
            other => {
                error!("Export failed: {}", other);
                Self::internal("Export failed")
            }
        }
    }
}
