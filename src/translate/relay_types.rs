//! The provider-agnostic request and the response the client sees.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u64 = 100;

// ---------------------------------------------------------------------------
// Request (what the client sends TO us)
// ---------------------------------------------------------------------------

/// Fields are extracted, not validated. Whatever the client put under each
/// key is forwarded as-is; defaults fill in only keys that are absent, so an
/// explicit `null` stays `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "systemPrompt", default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
    #[serde(default = "default_temperature")]
    pub temperature: Value,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Value,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            system_prompt: None,
            messages: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ChatRequest {
    /// Extract the relay fields from a parsed body. A body that is not a JSON
    /// object carries no fields.
    pub fn from_body(body: Value) -> Self {
        if !body.is_object() {
            return Self::default();
        }
        serde_json::from_value(body).unwrap_or_default()
    }

    /// Number of conversation turns, when `messages` is an array.
    pub fn turn_count(&self) -> usize {
        self.messages
            .as_ref()
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

fn default_temperature() -> Value {
    json!(DEFAULT_TEMPERATURE)
}

fn default_max_tokens() -> Value {
    json!(DEFAULT_MAX_TOKENS)
}

// ---------------------------------------------------------------------------
// Response (what we send BACK to the client)
// ---------------------------------------------------------------------------

/// Canonical `{choices: [{message: {content}}]}` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub content: String,
}

impl ChatResponse {
    /// A response with exactly one choice holding `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: text.into(),
                },
            }],
        }
    }
}

/// What a provider hands back for a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayResponse {
    /// Upstream body already in the canonical shape, returned byte for byte.
    Passthrough(Bytes),
    /// Body synthesized from a differently shaped upstream answer.
    Normalized(ChatResponse),
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: Value) -> Self {
        Self {
            error: error.into(),
            details: Some(details),
        }
    }
}
