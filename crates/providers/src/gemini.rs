//! Google Gemini handler.
//!
//! Uses the `generateContent` and `streamGenerateContent` APIs. Auth is via
//! an API key passed as a query parameter (`key={api_key}`), so URLs are
//! redacted before they are logged.

use crate::sse::sse_stream;
use crate::traits::{ApiHandler, MessageOptions};
use crate::util::{self, Reply};
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::error::{Error, Result};
use mr_domain::message::{ContentBlock, Message, Role};
use mr_domain::models::{self, ModelSelection};
use mr_domain::stream::{ApiStream, StreamEvent};
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GeminiHandler {
    base_url: String,
    api_key: Option<String>,
    model: ModelSelection,
    client: reqwest::Client,
}

impl GeminiHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        Self {
            base_url: util::base_url(options.gemini_base_url.as_deref(), DEFAULT_BASE_URL),
            api_key: options.gemini_api_key.clone(),
            model: models::resolve(
                models::GEMINI_MODELS,
                options.api_model_id.as_deref(),
                models::GEMINI_DEFAULT_MODEL_ID,
            ),
            client: reqwest::Client::new(),
        }
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn url(&self, streaming: bool, api_key: &str) -> String {
        if streaming {
            format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
                self.base_url, self.model.id, api_key
            )
        } else {
            format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.base_url, self.model.id, api_key
            )
        }
    }

    fn request(&self, body: &Value, streaming: bool) -> Result<reqwest::RequestBuilder> {
        let api_key =
            util::resolve_api_key(self.api_key.as_deref(), "geminiApiKey", API_KEY_ENV)?;
        let url = self.url(streaming, &api_key);
        tracing::debug!(
            provider = "gemini",
            url = %util::redact_url_key(&url),
            "gemini request"
        );
        Ok(self.client.post(url).json(body))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn build_body(
    system_prompt: &str,
    messages: &[Message],
    max_tokens: Option<u32>,
    json_output: bool,
) -> Value {
    let mut system_parts: Vec<String> = Vec::new();
    if !system_prompt.is_empty() {
        system_parts.push(system_prompt.to_string());
    }

    // tool_use id -> function name, for matching results to their calls.
    let mut call_names: HashMap<String, String> = HashMap::new();
    let mut contents: Vec<Value> = Vec::new();
    for msg in messages {
        for block in msg.content.blocks() {
            if let ContentBlock::ToolUse { id, name, .. } = block {
                call_names.insert(id, name);
            }
        }
        match msg.role {
            Role::System => system_parts.push(msg.content.extract_all_text()),
            Role::User => contents.push(to_gemini_content("user", msg, &call_names)),
            Role::Assistant => contents.push(to_gemini_content("model", msg, &call_names)),
        }
    }

    let mut body = serde_json::json!({ "contents": contents });
    if !system_parts.is_empty() {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{"text": system_parts.join("\n\n")}]
        });
    }

    let mut gen_config = serde_json::json!({ "temperature": 0 });
    if let Some(max) = max_tokens {
        gen_config["maxOutputTokens"] = serde_json::json!(max);
    }
    if json_output {
        gen_config["responseMimeType"] = serde_json::json!("application/json");
    }
    body["generationConfig"] = gen_config;

    body
}

fn to_gemini_content(role: &str, msg: &Message, call_names: &HashMap<String, String>) -> Value {
    let parts: Vec<Value> = msg
        .content
        .blocks()
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(serde_json::json!({"text": text})),
            ContentBlock::Image { source } => Some(serde_json::json!({
                "inlineData": {
                    "mimeType": source.media_type,
                    "data": source.data,
                }
            })),
            ContentBlock::ToolUse { name, input, .. } => Some(serde_json::json!({
                "functionCall": {"name": name, "args": input}
            })),
            // Gemini keys function responses by name. Fall back to the id
            // when the call is not in the history.
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                let name = call_names.get(&tool_use_id).cloned().unwrap_or(tool_use_id);
                Some(serde_json::json!({
                    "functionResponse": {
                        "name": name,
                        "response": {"content": content.text()},
                    }
                }))
            }
        })
        .collect();
    serde_json::json!({ "role": role, "parts": parts })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn first_candidate(v: &Value) -> Option<&Value> {
    v.get("candidates")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
}

/// Concatenated text of every part of the first candidate.
fn candidate_text(v: &Value) -> String {
    first_candidate(v)
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_gemini_usage(v: &Value) -> Option<StreamEvent> {
    Some(StreamEvent::Usage {
        input_tokens: util::u32_field(v, "promptTokenCount")?,
        output_tokens: util::u32_field(v, "candidatesTokenCount").unwrap_or(0),
    })
}

fn gemini_error(v: &Value) -> Option<Error> {
    let message = v.get("error")?.get("message")?.as_str()?;
    Some(Error::Provider {
        provider: "gemini".into(),
        message: message.to_string(),
    })
}

fn extract_reply(body: &Value) -> Result<Reply> {
    if let Some(err) = gemini_error(body) {
        return Err(err);
    }
    Ok(Reply {
        text: candidate_text(body),
        usage: body.get("usageMetadata").and_then(parse_gemini_usage),
    })
}

/// Parse a single Gemini streaming SSE data payload.
///
/// Each chunk yields at most one text event. Usage is taken from the chunk
/// carrying `finishReason`, since earlier chunks report running totals.
fn parse_gemini_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };
    if let Some(err) = gemini_error(&v) {
        return vec![Err(err)];
    }

    let mut events = Vec::new();
    let text = candidate_text(&v);
    if !text.is_empty() {
        events.push(Ok(StreamEvent::Text { text }));
    }

    let finished = first_candidate(&v)
        .and_then(|c| c.get("finishReason"))
        .is_some();
    if finished {
        if let Some(usage) = v.get("usageMetadata").and_then(parse_gemini_usage) {
            events.push(Ok(usage));
        }
    }
    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ApiHandler for GeminiHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let streaming = !options.json_output;
        let body = build_body(
            system_prompt,
            messages,
            self.model.info.max_tokens,
            options.json_output,
        );
        let request = self.request(&body, streaming);
        if streaming {
            sse_stream("gemini".into(), request, parse_gemini_sse_data)
        } else {
            util::json_stream("gemini".into(), request, extract_reply)
        }
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::Gemini
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_parts_are_joined_into_one_event() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        let events = parse_gemini_sse_data(data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &StreamEvent::text("Hello"));
    }

    #[test]
    fn chunk_without_text_yields_nothing() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[]}}],"usageMetadata":{"promptTokenCount":4}}"#;
        assert!(parse_gemini_sse_data(data).is_empty());
    }

    #[test]
    fn final_chunk_reports_usage() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"!"}]},"finishReason":"STOP"}],
            "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":6,"totalTokenCount":10}}"#;
        let events: Vec<StreamEvent> = parse_gemini_sse_data(data)
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::text("!"),
                StreamEvent::Usage { input_tokens: 4, output_tokens: 6 },
            ]
        );
    }

    #[test]
    fn error_payload_is_a_provider_error() {
        let data = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        let events = parse_gemini_sse_data(data);
        assert!(matches!(&events[0], Err(Error::Provider { message, .. }) if message == "API key not valid"));
    }

    #[test]
    fn body_carries_system_instruction_and_json_mime() {
        let body = build_body("be terse", &[Message::user("hi")], Some(8192), true);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn function_response_is_named_after_its_call() {
        use mr_domain::message::MessageContent;

        let call = Message {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "call_7".into(),
                name: "get_weather".into(),
                input: serde_json::json!({"city": "Oslo"}),
            }]),
        };
        let result = Message {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: "call_7".into(),
                content: "rain".into(),
                is_error: false,
            }]),
        };
        let body = build_body("", &[Message::user("weather?"), call, result], None, false);
        let response = &body["contents"][2]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "get_weather");
        assert_eq!(response["response"]["content"], "rain");
    }

    #[test]
    fn assistant_turns_use_model_role() {
        let body = build_body("", &[Message::assistant("earlier")], None, false);
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["contents"][0]["role"], "model");
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn stream_url_uses_sse() {
        let handler = GeminiHandler::new(&ApiHandlerOptions::default());
        let url = handler.url(true, "k");
        assert!(url.ends_with(":streamGenerateContent?alt=sse&key=k"));
        assert!(url.contains(models::GEMINI_DEFAULT_MODEL_ID));
        assert!(handler.url(false, "k").ends_with(":generateContent?key=k"));
    }
}
