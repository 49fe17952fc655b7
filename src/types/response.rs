use serde::{Deserialize, Serialize};

// ===== AI proxy request/response =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Summary,
    Experience,
    Skills,
    Improve,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Summary => "summary",
            GenerationKind::Experience => "experience",
            GenerationKind::Skills => "skills",
            GenerationKind::Improve => "improve",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationContext {
    #[serde(alias = "job_title")]
    pub job_title: String,
    pub company: String,
    pub position: String,
    pub description: String,
    pub skills: Vec<String>,
    pub summary: String,
    #[serde(alias = "years_of_experience")]
    pub years_of_experience: Option<u32>,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    #[serde(rename = "type")]
    pub kind: GenerationKind,
    #[serde(default)]
    pub context: GenerationContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    #[serde(rename = "type")]
    pub kind: GenerationKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    pub model: String,
}

// ===== OpenAI-compatible chat completion wire types =====

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderError {
    pub error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ProviderErrorBody {
    pub message: String,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the provider returned any
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}
