//! OpenAI-compatible chat completion connector for model analysis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use model_scout::{AnalysisRequest, CompletionClient, LlmAnalysis, LlmError};

const SYSTEM_PROMPT: &str = "You are a strict analyst for specialized machine \
learning models. Classify the model, identify its base, and describe the \
delta against that base. Every claim must carry a verbatim supporting quote \
from the README. Answer with a single JSON object with the fields: category \
(base|adapter|finetune), base_model (string or null), delta (string), \
specialist_score (integer 1-10), evidence (array of {claim, quote}). If the \
README does not support a field, set it to null.";

/// README text beyond this length adds cost without adding signal.
const MAX_README_CHARS: usize = 16_000;

pub struct CompletionApiClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl CompletionApiClient {
    pub fn new(api_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            model: model.into(),
            api_key,
        }
    }

    fn user_prompt(request: &AnalysisRequest<'_>) -> String {
        let readme: String = request.readme.chars().take(MAX_README_CHARS).collect();
        format!(
            "Analyze this model.\n\nModel: {}\nTags: {}\nCard data: {}\n\nREADME:\n{}",
            request.model_id,
            request.tags.join(", "),
            request.card_data,
            readme,
        )
    }
}

#[async_trait]
impl CompletionClient for CompletionApiClient {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<LlmAnalysis, LlmError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user",
                    content: Self::user_prompt(&request),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let mut http_request = self.http.post(&self.api_url).json(&payload);
        if let Some(key) = &self.api_key {
            http_request = http_request.bearer_auth(key);
        }
        let response = http_request.send().await.map_err(to_llm_error)?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            return Err(LlmError::Transport(format!("completion API returned {status}")));
        }

        let completion: ChatResponse = response.json().await.map_err(to_llm_error)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Malformed("empty choices".into()))?;

        parse_analysis(&content)
    }
}

/// Parse the model's reply, tolerating a fenced code block around the JSON.
fn parse_analysis(content: &str) -> Result<LlmAnalysis, LlmError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

fn to_llm_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(e.to_string())
    }
}
