//! Translate a relay [`ChatRequest`] into the selected provider's request shape.
//!
//! OpenAI receives the system prompt as a leading `system`-role message;
//! Anthropic receives it in the top-level `system` field with the messages
//! left exactly as the client sent them.

use serde_json::{json, Map, Value};

use super::anthropic_types::MessagesRequest;
use super::openai_types::ChatCompletionRequest;
use super::relay_types::ChatRequest;
use crate::error::{RelayError, Result};

/// Translate a relay request into an `OpenAI` Chat Completions request.
///
/// Client messages are appended after the system message without looking
/// inside them. A `messages` value that is present but not a list cannot be
/// appended and is an error.
pub fn to_openai(req: &ChatRequest, model: &str) -> Result<ChatCompletionRequest> {
    let mut messages = Vec::with_capacity(req.turn_count() + 1);
    messages.push(system_message(req.system_prompt.as_ref()));

    match req.messages {
        Some(Value::Array(ref turns)) => messages.extend(turns.iter().cloned()),
        None | Some(Value::Null) => {}
        Some(ref other) => {
            return Err(RelayError::translation(format!(
                "messages is not a list: {}",
                other
            )))
        }
    }

    Ok(ChatCompletionRequest {
        model: model.to_string(),
        messages,
        max_tokens: req.max_tokens.clone(),
        temperature: req.temperature.clone(),
    })
}

// An absent prompt leaves `content` off the system message entirely.
fn system_message(prompt: Option<&Value>) -> Value {
    let mut msg = Map::new();
    msg.insert("role".to_string(), json!("system"));
    if let Some(prompt) = prompt {
        msg.insert("content".to_string(), prompt.clone());
    }
    Value::Object(msg)
}

/// Translate a relay request into an Anthropic Messages request.
pub fn to_anthropic(req: &ChatRequest, model: &str) -> MessagesRequest {
    MessagesRequest {
        model: model.to_string(),
        system: req.system_prompt.clone(),
        messages: req.messages.clone(),
        max_tokens: req.max_tokens.clone(),
        temperature: req.temperature.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> ChatRequest {
        ChatRequest::from_body(json!({
            "systemPrompt": "You are a dog behaviour expert.",
            "messages": [
                {"role": "user", "content": "Why does my dog bark?"},
                {"role": "assistant", "content": "Usually boredom."},
                {"role": "user", "content": "How do I stop it?"}
            ],
            "temperature": 0.2,
            "max_tokens": 64
        }))
    }

    #[test]
    fn test_openai_prepends_system_prompt() {
        let out = to_openai(&sample_request(), "gpt-3.5-turbo").unwrap();

        assert_eq!(out.model, "gpt-3.5-turbo");
        assert_eq!(out.messages.len(), 4);
        assert_eq!(
            out.messages[0],
            json!({"role": "system", "content": "You are a dog behaviour expert."})
        );
        assert_eq!(out.messages[1]["role"], "user");
        assert_eq!(out.messages[3]["content"], "How do I stop it?");
        assert_eq!(out.max_tokens, json!(64));
        assert_eq!(out.temperature, json!(0.2));
    }

    #[test]
    fn test_openai_wire_shape() {
        let out = to_openai(&sample_request(), "gpt-3.5-turbo").unwrap();
        let body = serde_json::to_value(&out).unwrap();

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 64);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_openai_without_prompt_or_messages() {
        let req = ChatRequest::from_body(json!({}));
        let body = serde_json::to_value(to_openai(&req, "gpt-3.5-turbo").unwrap()).unwrap();

        assert_eq!(body["messages"], json!([{"role": "system"}]));
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 100);
    }

    #[test]
    fn test_openai_forwards_loose_values_untouched() {
        let req = ChatRequest::from_body(json!({
            "systemPrompt": "Be brief.",
            "messages": [{"content": "hi"}, {"role": "user", "content": [{"type": "text", "text": "x"}], "name": "sam"}],
            "temperature": "0.5",
            "max_tokens": null
        }));
        let body = serde_json::to_value(to_openai(&req, "gpt-3.5-turbo").unwrap()).unwrap();

        assert_eq!(body["messages"][1], json!({"content": "hi"}));
        assert_eq!(body["messages"][2]["name"], "sam");
        assert_eq!(body["temperature"], "0.5");
        assert_eq!(body["max_tokens"], Value::Null);
        assert!(body.as_object().unwrap().contains_key("max_tokens"));
    }

    #[test]
    fn test_openai_rejects_non_list_messages() {
        let req = ChatRequest::from_body(json!({"messages": "hello"}));
        let err = to_openai(&req, "gpt-3.5-turbo").unwrap_err();
        assert!(matches!(err, RelayError::Translation { .. }));
    }

    #[test]
    fn test_anthropic_keeps_messages_and_system_field() {
        let out = to_anthropic(&sample_request(), "claude-3-haiku-20240307");
        let body = serde_json::to_value(&out).unwrap();

        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["system"], "You are a dog behaviour expert.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(
            body["messages"][0],
            json!({"role": "user", "content": "Why does my dog bark?"})
        );
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["temperature"], 0.2);
    }

    #[test]
    fn test_anthropic_omits_absent_fields() {
        let req = ChatRequest::from_body(json!({}));
        let body = serde_json::to_value(to_anthropic(&req, "m")).unwrap();

        assert!(body.get("system").is_none());
        assert!(body.get("messages").is_none());
    }
}
