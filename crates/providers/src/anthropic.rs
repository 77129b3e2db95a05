//! Anthropic-native handler.
//!
//! Talks to the Anthropic Messages API, where the system prompt goes in a
//! separate top-level `system` field. The body builder and the SSE parser are
//! shared with the Vertex handler, which serves the same models behind
//! Google's endpoint.

use crate::sse::sse_stream;
use crate::traits::{ApiHandler, MessageOptions};
use crate::util::{self, Reply};
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::error::{Error, Result};
use mr_domain::message::{Message, MessageContent, Role};
use mr_domain::models::{self, ModelSelection};
use mr_domain::stream::{ApiStream, StreamEvent};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Used when a model descriptor carries no output ceiling.
pub(crate) const FALLBACK_MAX_TOKENS: u32 = 8_192;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handler for the Anthropic Messages API.
pub struct AnthropicHandler {
    base_url: String,
    api_key: Option<String>,
    model: ModelSelection,
    client: reqwest::Client,
}

impl AnthropicHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        Self {
            base_url: util::base_url(options.anthropic_base_url.as_deref(), DEFAULT_BASE_URL),
            api_key: options.api_key.clone(),
            model: models::resolve(
                models::ANTHROPIC_MODELS,
                options.api_model_id.as_deref(),
                models::ANTHROPIC_DEFAULT_MODEL_ID,
            ),
            client: reqwest::Client::new(),
        }
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn request(&self, body: &Value) -> Result<reqwest::RequestBuilder> {
        let api_key = util::resolve_api_key(self.api_key.as_deref(), "apiKey", API_KEY_ENV)?;
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(provider = "anthropic", url = %url, model = %self.model.id, "anthropic request");
        Ok(self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request body
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build a Messages API body without the `model` field.
///
/// System turns found in the history are folded into the `system` field
/// after the system prompt.
pub(crate) fn messages_body(
    system_prompt: &str,
    messages: &[Message],
    max_tokens: u32,
    stream: bool,
) -> Value {
    let mut system_parts: Vec<String> = Vec::new();
    if !system_prompt.is_empty() {
        system_parts.push(system_prompt.to_string());
    }

    let mut api_messages: Vec<Value> = Vec::with_capacity(messages.len());
    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(msg.content.extract_all_text()),
            Role::User => api_messages.push(message_to_anthropic("user", &msg.content)),
            Role::Assistant => api_messages.push(message_to_anthropic("assistant", &msg.content)),
        }
    }

    let mut body = serde_json::json!({
        "max_tokens": max_tokens,
        "temperature": 0,
        "messages": api_messages,
        "stream": stream,
    });
    if !system_parts.is_empty() {
        body["system"] = Value::String(system_parts.join("\n\n"));
    }
    body
}

// Message blocks already use the Anthropic shape.
fn message_to_anthropic(role: &str, content: &MessageContent) -> Value {
    let content = match content {
        MessageContent::Text(t) => Value::String(t.clone()),
        MessageContent::Blocks(blocks) => Value::Array(
            blocks
                .iter()
                .filter_map(|b| serde_json::to_value(b).ok())
                .collect(),
        ),
    };
    serde_json::json!({"role": role, "content": content})
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_usage(v: &Value) -> Option<StreamEvent> {
    Some(StreamEvent::Usage {
        input_tokens: util::u32_field(v, "input_tokens")?,
        output_tokens: util::u32_field(v, "output_tokens").unwrap_or(0),
    })
}

fn error_message(v: &Value) -> String {
    v.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}

/// Non-streaming reply: every `text` content block, concatenated.
pub(crate) fn extract_reply(provider: &str, body: &Value) -> Result<Reply> {
    if body.get("type").and_then(Value::as_str) == Some("error") {
        return Err(Error::Provider {
            provider: provider.into(),
            message: error_message(body),
        });
    }

    let text = body
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    let usage = body.get("usage").and_then(parse_anthropic_usage);
    Ok(Reply { text, usage })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming SSE helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Input token count carried from `message_start` to `message_delta`.
#[derive(Debug, Default)]
pub(crate) struct StreamState {
    input_tokens: u32,
}

fn text_event(text: Option<&str>) -> Vec<Result<StreamEvent>> {
    match text {
        Some(t) if !t.is_empty() => vec![Ok(StreamEvent::text(t))],
        _ => Vec::new(),
    }
}

/// Parse a single Anthropic SSE data payload into zero or more events.
pub(crate) fn parse_anthropic_sse(
    provider: &str,
    data: &str,
    state: &mut StreamState,
) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    match v.get("type").and_then(Value::as_str).unwrap_or("") {
        "message_start" => {
            state.input_tokens = v
                .get("message")
                .and_then(|m| m.get("usage"))
                .and_then(|u| util::u32_field(u, "input_tokens"))
                .unwrap_or(0);
            Vec::new()
        }

        "content_block_start" => {
            let block = v.get("content_block");
            match block.and_then(|b| b.get("type")).and_then(Value::as_str) {
                Some("text") => text_event(block.and_then(|b| b.get("text")).and_then(Value::as_str)),
                _ => Vec::new(),
            }
        }

        "content_block_delta" => {
            let delta = v.get("delta");
            match delta.and_then(|d| d.get("type")).and_then(Value::as_str) {
                Some("text_delta") => {
                    text_event(delta.and_then(|d| d.get("text")).and_then(Value::as_str))
                }
                _ => Vec::new(),
            }
        }

        "message_delta" => v
            .get("usage")
            .and_then(|u| util::u32_field(u, "output_tokens"))
            .map(|output_tokens| {
                vec![Ok(StreamEvent::Usage {
                    input_tokens: state.input_tokens,
                    output_tokens,
                })]
            })
            .unwrap_or_default(),

        "error" => vec![Err(Error::Provider {
            provider: provider.into(),
            message: error_message(&v),
        })],

        // ping, content_block_stop, message_stop
        _ => Vec::new(),
    }
}

/// Run a Messages API call, streaming or not depending on `body["stream"]`.
pub(crate) fn run(
    provider: &'static str,
    request: Result<reqwest::RequestBuilder>,
    streaming: bool,
) -> ApiStream {
    if streaming {
        let mut state = StreamState::default();
        sse_stream(provider.into(), request, move |data| {
            parse_anthropic_sse(provider, data, &mut state)
        })
    } else {
        util::json_stream(provider.into(), request, move |body| extract_reply(provider, body))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ApiHandler for AnthropicHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let streaming = !options.json_output;
        let max_tokens = self.model.info.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS);
        let mut body = messages_body(system_prompt, messages, max_tokens, streaming);
        body["model"] = Value::String(self.model.id.clone());
        run("anthropic", self.request(&body), streaming)
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::Anthropic
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
