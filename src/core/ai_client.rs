// src/core/ai_client.rs
//! Client for the external text-generation provider (OpenAI-compatible chat completions)

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config_manager::AiSettings;
use crate::core::prompts::build_prompt;
use crate::types::response::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, GenerationKind,
    GenerationRequest, GenerationResult, ProviderError,
};
use crate::types::resume_data::dedup_skills;

const CHAT_COMPLETIONS_ENDPOINT: &str = "/chat/completions";
const MAX_ATTEMPTS: u32 = 3;
const MAX_SKILLS: usize = 15;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI generation is not configured")]
    NotConfigured,

    #[error("missing context for {kind}: {field}")]
    MissingContext { kind: &'static str, field: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("provider returned empty content")]
    EmptyContent,
}

/// Text of one chat completion and the model that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    retry_base_delay: Duration,
}

impl AiClient {
    pub fn new(settings: &AiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            retry_base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the prompt for the request, call the provider and clean up the answer
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, AiError> {
        let prompt = build_prompt(request.kind, &request.context).map_err(|field| {
            AiError::MissingContext {
                kind: request.kind.as_str(),
                field,
            }
        })?;

        if !self.is_configured() {
            return Err(AiError::NotConfigured);
        }

        let completion = self.complete(prompt.system, &prompt.user).await?;
        let content = clean_output(&completion.text);
        if content.is_empty() {
            return Err(AiError::EmptyContent);
        }

        let items = match request.kind {
            GenerationKind::Skills => Some(parse_skill_list(&content)),
            _ => None,
        };

        info!(
            "AI generation completed: kind={}, chars={}",
            request.kind.as_str(),
            content.len()
        );

        Ok(GenerationResult {
            kind: request.kind,
            content,
            items,
            model: completion.model,
        })
    }

    /// One chat completion; retries 429, 5xx and transport failures with backoff
    pub async fn complete(&self, system: &str, user: &str) -> Result<Completion, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_ENDPOINT);

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut last_error: Option<AiError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = self.retry_base_delay * (1 << (attempt - 1));
                warn!(
                    "AI call attempt {} failed, retrying after {}ms",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            debug!("Calling AI provider: {}", url);

            let response = match self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AiError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                last_error = Some(AiError::Upstream {
                    status: status.as_u16(),
                    message: provider_message(&text),
                });
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(AiError::Upstream {
                    status: status.as_u16(),
                    message: provider_message(&text),
                });
            }

            let completion: ChatCompletionResponse = response.json().await?;
            let text = completion
                .text()
                .map(str::to_string)
                .ok_or(AiError::EmptyContent)?;
            if attempt > 0 {
                info!("AI call succeeded on attempt {}", attempt + 1);
            }
            return Ok(Completion {
                text,
                model: completion.model.unwrap_or_else(|| self.model.clone()),
            });
        }

        Err(last_error.unwrap_or(AiError::EmptyContent))
    }
}

fn provider_message(body: &str) -> String {
    serde_json::from_str::<ProviderError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(300).collect())
}

// ===== Output cleanup =====

fn looks_like_html(text: &str) -> bool {
    text.match_indices('<').any(|(i, _)| {
        text[i + 1..]
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '/')
    })
}

/// Flatten HTML to text, keeping paragraphs and list items on their own lines
fn strip_html(text: &str) -> String {
    let fragment = Html::parse_fragment(text);

    if let Ok(blocks) = Selector::parse("p, li, h1, h2, h3") {
        let parts: Vec<String> = fragment
            .select(&blocks)
            .map(|el| {
                let inner = el.text().collect::<String>().trim().to_string();
                if el.value().name() == "li" && !inner.is_empty() {
                    format!("- {}", inner)
                } else {
                    inner
                }
            })
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join("\n");
        }
    }

    fragment.root_element().text().collect()
}

const LABELS: [&str; 5] = [
    "professional summary:",
    "summary:",
    "description:",
    "skills:",
    "improved text:",
];

/// Normalise a model answer into plain resume text
pub fn clean_output(raw: &str) -> String {
    let mut text: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    if looks_like_html(&text) {
        text = strip_html(&text);
    }

    let mut text = text.trim().to_string();

    let lower = text.to_lowercase();
    if let Some(label) = LABELS.iter().find(|l| lower.starts_with(*l)) {
        text = text[label.len()..].trim_start().to_string();
    }

    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if text.len() > 1 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].to_string();
            break;
        }
    }

    text.trim().to_string()
}

/// `3. Go` and `3) Go` become `Go`; `3D modeling` is left alone
fn strip_list_number(item: &str) -> &str {
    let digits = item.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = item[digits..].strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    item
}

/// Split a skills answer (comma list or bullet lines) into a de-duplicated list
pub fn parse_skill_list(text: &str) -> Vec<String> {
    let pieces = text.split([',', '\n', ';']).map(|piece| {
        let piece = piece.trim().trim_start_matches(['-', '*', '\u{2022}']).trim();
        strip_list_number(piece).trim_end_matches('.').to_string()
    });

    dedup_skills(pieces).into_iter().take(MAX_SKILLS).collect()
}
