//! Conversational assistant for site visitors.
//!
//! Forwards chat turns to a Gemini-style `generateContent` endpoint with a
//! system prompt built from the live site settings. Without an API key the
//! assistant is switched off and nothing else is affected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::SiteInfo;

/// Departments the college teaches.
pub const DEPARTMENTS: &[&str] = &[
    "অফিস ব্যবস্থাপনা",
    "হিসাব বিজ্ঞান",
    "ব্যবসায় সংগঠন ও ব্যবস্থাপনা",
    "মানব সম্পদ ব্যবস্থাপনা",
    "ব্যাংকিং",
    "মার্কেটিং",
    "কম্পিউটার অপারেশন",
    "ই-কমার্স / ডিজিটাল মার্কেটিং",
];

const DISABLED_MESSAGE: &str = "চ্যাট এই মুহূর্তে উপলব্ধ নয়।";
const FAILED_MESSAGE: &str = "দুঃখিত, একটি সমস্যা হয়েছে। অনুগ্রহ করে আবার চেষ্টা করুন।";
const UNKNOWN_ANSWER: &str =
    "এই মুহূর্তে আমার কাছে এই তথ্যটি নেই। অনুগ্রহ করে কলেজ অফিসে যোগাযোগ করুন।";

/// Turns of earlier conversation forwarded with each message.
const MAX_HISTORY: usize = 20;
const MAX_MESSAGE_CHARS: usize = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AssistantStatus {
    Enabled { model: String, greeting: String },
    Disabled { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

// generateContent wire format

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

struct Backend {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

pub struct Assistant {
    model: String,
    backend: Option<Backend>,
}

impl Assistant {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let Some(api_key) = config.assistant_api_key.clone() else {
            tracing::info!("Assistant disabled: CMS_ASSISTANT_API_KEY is not set");
            return Ok(Self::disabled(&config.assistant_model));
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build assistant client: {}", e)))?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.assistant_endpoint, config.assistant_model
        );
        tracing::info!("Assistant enabled with model {}", config.assistant_model);

        Ok(Self {
            model: config.assistant_model.clone(),
            backend: Some(Backend {
                client,
                api_key,
                url,
            }),
        })
    }

    pub fn disabled(model: &str) -> Self {
        Self {
            model: model.to_string(),
            backend: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn status(&self, info: &SiteInfo) -> AssistantStatus {
        if self.is_enabled() {
            AssistantStatus::Enabled {
                model: self.model.clone(),
                greeting: greeting(info),
            }
        } else {
            AssistantStatus::Disabled {
                message: DISABLED_MESSAGE.to_string(),
            }
        }
    }

    /// Answer one visitor message, given the conversation so far.
    pub async fn chat(
        &self,
        info: &SiteInfo,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AppError> {
        let Some(backend) = &self.backend else {
            return Err(AppError::Unavailable(DISABLED_MESSAGE.to_string()));
        };

        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("message must not be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let prompt = system_prompt(info);
        let recent = &history[history.len().saturating_sub(MAX_HISTORY)..];
        let mut contents: Vec<Content> = recent
            .iter()
            .filter(|turn| !turn.content.trim().is_empty())
            .map(|turn| Content {
                role: Some(match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                }),
                parts: vec![Part {
                    text: &turn.content,
                }],
            })
            .collect();
        contents.push(Content {
            role: Some("user"),
            parts: vec![Part { text: message }],
        });

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &prompt }],
            },
            contents,
        };

        let response = backend
            .client
            .post(&backend.url)
            .header("x-goog-api-key", &backend.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Assistant request failed: {}", e);
                AppError::Unavailable(FAILED_MESSAGE.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Assistant returned {}: {}", status, body);
            return Err(AppError::Unavailable(FAILED_MESSAGE.to_string()));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            tracing::warn!("Assistant response unreadable: {}", e);
            AppError::Unavailable(FAILED_MESSAGE.to_string())
        })?;

        let reply: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if reply.trim().is_empty() {
            tracing::warn!("Assistant returned an empty reply");
            return Err(AppError::Unavailable(FAILED_MESSAGE.to_string()));
        }
        Ok(reply)
    }
}

/// First message shown when the chat opens.
pub fn greeting(info: &SiteInfo) -> String {
    format!(
        "হ্যালো! আমি আপনার সহকারী। {} সম্পর্কে আপনার কী জানার আছে?",
        info.college_name
    )
}

/// Instructions given to the model ahead of every conversation.
pub fn system_prompt(info: &SiteInfo) -> String {
    format!(
        r#"You are a friendly and helpful AI assistant for the college "{name}". Your name is "সহকারী" (Assistant). Your goal is to answer questions from prospective students, current students, and parents.
- The college name is "{name}".
- Location: {location}.
- Established: {established}.
- Principal: {principal} ({designation}).
- Phone: {phone}. Email: {email}.
- Office hours: {days}, {time}.
- Key departments: {departments}.
- Always be polite and provide information in Bengali (Bangla).
- If you don't know an answer, say "{unknown}".
- Keep answers concise and helpful."#,
        name = info.college_name,
        location = info.location,
        established = info.established,
        principal = info.principal_name,
        designation = info.principal_designation,
        phone = info.phone,
        email = info.email,
        days = info.office_hours_days,
        time = info.office_hours_time,
        departments = DEPARTMENTS.join(", "),
        unknown = UNKNOWN_ANSWER,
    )
}
