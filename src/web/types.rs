// src/web/types.rs - Request/response types shared by the API handlers

use chrono::{DateTime, Utc};
use rocket::http::{ContentType, Header};
use rocket::response::{self, Responder};
use rocket::serde::{Deserialize, Serialize};
use rocket::{Request, Response};
use serde_json::Value;

use crate::core::database::Resume;
use crate::types::FieldIssue;

pub struct ServerConfig {
    pub max_resumes_per_user: u32,
}

/// Binary or text attachment (downloads)
pub struct FileResponse {
    pub data: Vec<u8>,
    pub content_type: ContentType,
    pub filename: String,
}

impl<'r> Responder<'r, 'static> for FileResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(self.content_type)
            .header(Header::new(
                "Content-Disposition",
                crate::utils::attachment_header(&self.filename),
            ))
            .sized_body(self.data.len(), std::io::Cursor::new(self.data))
            .ok()
    }
}

// ===== Requests =====

#[derive(Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct SaveResumeRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "template_id", alias = "template")]
    pub template_id: Option<i64>,
    #[serde(alias = "resumeData", alias = "resume_data")]
    pub data: Value,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct UpdateResumeRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "template_id", alias = "template")]
    pub template_id: Option<i64>,
    #[serde(default, alias = "resumeData", alias = "resume_data")]
    pub data: Option<Value>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default, alias = "template_id")]
    pub template_id: Option<i64>,
    #[serde(alias = "resumeData", alias = "resume_data")]
    pub data: Value,
}

// ===== Response payloads =====

/// A stored resume with its derived status
#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct ResumeView {
    #[serde(flatten)]
    pub resume: Resume,
    pub completeness: u8,
    pub issues: Vec<FieldIssue>,
}

impl From<Resume> for ResumeView {
    fn from(resume: Resume) -> Self {
        Self {
            completeness: resume.data.completeness(),
            issues: resume.data.validate(),
            resume,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub resume_count: u32,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "camelCase")]
pub struct HealthInfo {
    pub status: &'static str,
    pub database: &'static str,
    pub ai_configured: bool,
    pub version: &'static str,
}

// ===== Standard envelope =====

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

impl TextResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message: message.into(),
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message: message.into(),
            action: action.into(),
            next_actions: None,
        }
    }

    pub fn with_next_actions(mut self, next_actions: Vec<String>) -> Self {
        self.next_actions = Some(next_actions);
        self
    }
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}
