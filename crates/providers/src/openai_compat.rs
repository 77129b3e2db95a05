//! OpenAI-compatible engine.
//!
//! Shared by every vendor that speaks the OpenAI chat completions contract:
//! OpenAI itself, OpenRouter, Ollama, LM Studio and Cerebras. The
//! per-vendor handlers only decide the base URL, the credentials, extra
//! headers and the model.

use crate::sse::sse_stream;
use crate::traits::{CompletionOptions, Prompt, RemoteModel};
use crate::util::{self, Reply};
use mr_domain::error::{Error, Result};
use mr_domain::message::{ContentBlock, Message, MessageContent, Role};
use mr_domain::models::{self, ModelTable};
use mr_domain::stream::{ApiStream, StreamEvent};
use serde_json::Value;

const DEFAULT_COMPLETION_TEMPERATURE: f32 = 0.0;
const DEFAULT_COMPLETION_TOP_P: f32 = 1.0;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where an OpenAI-compatible client gets its bearer token.
#[derive(Debug, Clone)]
pub(crate) enum ApiKey {
    /// Local servers that accept any token.
    Fixed(&'static str),
    /// A configured key with a conventional environment fallback,
    /// resolved on each call.
    Configured {
        value: Option<String>,
        option_name: &'static str,
        env_var: &'static str,
    },
}

impl ApiKey {
    fn resolve(&self) -> Result<String> {
        match self {
            ApiKey::Fixed(key) => Ok((*key).to_string()),
            ApiKey::Configured {
                value,
                option_name,
                env_var,
            } => util::resolve_api_key(value.as_deref(), option_name, env_var),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An HTTP client bound to one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiCompatClient {
    provider: &'static str,
    base_url: String,
    api_key: ApiKey,
    extra_headers: Vec<(&'static str, String)>,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub(crate) fn new(provider: &'static str, base_url: String, api_key: ApiKey) -> Self {
        Self {
            provider,
            base_url,
            api_key,
            extra_headers: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    /// Attach a header sent with every request.
    pub(crate) fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.extra_headers.push((name, value.into()));
        self
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Internal: build authenticated request builders ─────────────

    fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let key = self.api_key.resolve()?;
        let mut builder = builder.bearer_auth(key);
        for (name, value) in &self.extra_headers {
            builder = builder.header(*name, value);
        }
        Ok(builder)
    }

    fn post(&self, path: &str, body: &Value) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(provider = %self.provider, url = %url, "openai_compat request");
        self.authed(self.client.post(url).json(body))
    }

    fn get(&self, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(provider = %self.provider, url = %url, "openai_compat request");
        self.authed(self.client.get(url))
    }

    // ── Operations ────────────────────────────────────────────────

    /// Run a chat completion. `body["stream"]` decides the sub-mode.
    pub(crate) fn chat(&self, body: Value) -> ApiStream {
        let streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let provider = self.provider;
        let request = self.post("/chat/completions", &body);
        if streaming {
            sse_stream(provider.into(), request, move |d| parse_chat_chunk(provider, d))
        } else {
            util::json_stream(provider.into(), request, move |v| extract_chat_reply(provider, v))
        }
    }

    /// Run a legacy text completion. `body["stream"]` decides the sub-mode.
    pub(crate) fn completion(&self, body: Value) -> ApiStream {
        let streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let provider = self.provider;
        let request = self.post("/completions", &body);
        if streaming {
            sse_stream(provider.into(), request, move |d| parse_completion_chunk(provider, d))
        } else {
            util::json_stream(provider.into(), request, move |v| {
                extract_completion_reply(provider, v)
            })
        }
    }

    /// `GET /models`, keeping only ids present in `allow_list`, in vendor order.
    pub(crate) async fn list_models(&self, allow_list: ModelTable) -> Result<Vec<RemoteModel>> {
        let body = util::send_json(self.provider, self.get("/models")).await?;
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Provider {
                provider: self.provider.into(),
                message: "missing 'data' array in models response".into(),
            })?;
        Ok(filter_allowed(data, allow_list))
    }

    /// `GET /models/{id}`; any failure is logged and resolves to `None`.
    pub(crate) async fn model_info(&self, model_id: &str) -> Option<RemoteModel> {
        let path = format!("/models/{model_id}");
        let result = util::send_json(self.provider, self.get(&path))
            .await
            .and_then(|v| serde_json::from_value::<RemoteModel>(v).map_err(Error::Json));
        match result {
            Ok(model) => Some(model),
            Err(e) => {
                tracing::warn!(
                    provider = %self.provider,
                    model_id = %model_id,
                    error = %e,
                    "model info lookup failed"
                );
                None
            }
        }
    }
}

fn filter_allowed(data: &[Value], allow_list: ModelTable) -> Vec<RemoteModel> {
    data.iter()
        .filter_map(|m| serde_json::from_value::<RemoteModel>(m.clone()).ok())
        .filter(|m| models::is_listed(allow_list, &m.id))
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request bodies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parameters for [`chat_body`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ChatParams {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stream: bool,
    pub json_output: bool,
    /// Ask for a trailing usage chunk on streamed responses.
    pub include_usage: bool,
}

pub(crate) fn chat_body(params: &ChatParams, messages: Vec<Value>) -> Value {
    let mut body = serde_json::json!({
        "model": params.model,
        "messages": messages,
        "stream": params.stream,
    });
    if let Some(max) = params.max_tokens {
        body["max_tokens"] = serde_json::json!(max);
    }
    if let Some(temp) = params.temperature {
        body["temperature"] = serde_json::json!(temp);
    }
    if params.json_output {
        body["response_format"] = serde_json::json!({"type": "json_object"});
    }
    if params.stream && params.include_usage {
        body["stream_options"] = serde_json::json!({"include_usage": true});
    }
    body
}

/// Build a `/completions` body, applying the per-field defaults.
pub(crate) fn completion_body(
    model: &str,
    prompt: &Prompt,
    options: &CompletionOptions,
    default_max_tokens: Option<u32>,
) -> Value {
    let mut body = serde_json::json!({
        "model": model,
        "prompt": prompt,
        "temperature": options.temperature.unwrap_or(DEFAULT_COMPLETION_TEMPERATURE),
        "top_p": options.top_p.unwrap_or(DEFAULT_COMPLETION_TOP_P),
        "stream": options.stream.unwrap_or(true),
        "echo": options.echo.unwrap_or(false),
    });
    if let Some(max) = options.max_tokens.or(default_max_tokens) {
        body["max_tokens"] = serde_json::json!(max);
    }
    if let Some(stop) = &options.stop {
        body["stop"] = serde_json::json!(stop);
    }
    if let Some(user) = &options.user {
        body["user"] = serde_json::json!(user);
    }
    if let Some(seed) = options.seed {
        body["seed"] = serde_json::json!(seed);
    }
    body
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a system prompt plus history into OpenAI chat messages.
///
/// `system_role` is the role the system prompt is sent under; o1-family
/// models reject `system` and take it as a `user` turn instead.
pub(crate) fn to_openai_messages(
    system_prompt: &str,
    system_role: &str,
    messages: &[Message],
) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system_prompt.is_empty() {
        out.push(serde_json::json!({"role": system_role, "content": system_prompt}));
    }
    for msg in messages {
        match msg.role {
            Role::System => out.push(serde_json::json!({
                "role": system_role,
                "content": msg.content.extract_all_text(),
            })),
            Role::User => user_to_openai(msg, &mut out),
            Role::Assistant => out.push(assistant_to_openai(msg)),
        }
    }
    out
}

/// User turns: tool results become separate `tool` messages ahead of the
/// remaining text/image parts.
fn user_to_openai(msg: &Message, out: &mut Vec<Value>) {
    let blocks = match &msg.content {
        MessageContent::Text(t) => {
            out.push(serde_json::json!({"role": "user", "content": t}));
            return;
        }
        MessageContent::Blocks(blocks) => blocks,
    };

    let mut parts: Vec<Value> = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => out.push(serde_json::json!({
                "role": "tool",
                "tool_call_id": tool_use_id,
                "content": content.text(),
            })),
            ContentBlock::Text { text } => {
                parts.push(serde_json::json!({"type": "text", "text": text}));
            }
            ContentBlock::Image { source } => parts.push(serde_json::json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", source.media_type, source.data),
                }
            })),
            ContentBlock::ToolUse { .. } => {}
        }
    }
    if !parts.is_empty() {
        out.push(serde_json::json!({"role": "user", "content": parts}));
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    for block in msg.content.blocks() {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(serde_json::json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": input.to_string(),
                    }
                }));
            }
            _ => {}
        }
    }

    if text_parts.is_empty() {
        obj["content"] = Value::Null;
    } else {
        obj["content"] = Value::String(text_parts.join("\n"));
    }
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn first_choice(v: &Value) -> Option<&Value> {
    v.get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
}

fn parse_openai_usage(v: &Value) -> Option<StreamEvent> {
    Some(StreamEvent::Usage {
        input_tokens: util::u32_field(v, "prompt_tokens")?,
        output_tokens: util::u32_field(v, "completion_tokens")?,
    })
}

fn error_message(v: &Value) -> Option<&str> {
    v.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
}

fn no_choices(provider: &str, body: &Value) -> Error {
    Error::Provider {
        provider: provider.into(),
        message: error_message(body)
            .unwrap_or("no choices in response")
            .to_string(),
    }
}

/// Non-streaming chat reply: `choices[0].message.content`.
pub(crate) fn extract_chat_reply(provider: &str, body: &Value) -> Result<Reply> {
    let choice = first_choice(body).ok_or_else(|| no_choices(provider, body))?;
    let text = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let usage = body.get("usage").and_then(parse_openai_usage);
    Ok(Reply { text, usage })
}

/// Non-streaming completion reply. A batch prompt returns one choice per
/// prompt; their texts are joined in `index` order.
pub(crate) fn extract_completion_reply(provider: &str, body: &Value) -> Result<Reply> {
    let choices = body
        .get("choices")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| no_choices(provider, body))?;
    let mut parts: Vec<(u64, &str)> = choices
        .iter()
        .enumerate()
        .map(|(pos, c)| {
            let index = c.get("index").and_then(Value::as_u64).unwrap_or(pos as u64);
            (index, c.get("text").and_then(Value::as_str).unwrap_or(""))
        })
        .collect();
    parts.sort_by_key(|(index, _)| *index);
    let text: String = parts.into_iter().map(|(_, t)| t).collect();
    let usage = body.get("usage").and_then(parse_openai_usage);
    Ok(Reply { text, usage })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared chunk handling: `[DONE]`, JSON errors, usage-only chunks, and
/// a text field picked out of `choices[0]` by `text_of`.
fn parse_chunk(
    provider: &str,
    data: &str,
    text_of: fn(&Value) -> Option<&str>,
) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(message) = error_message(&v) {
        return vec![Err(Error::Provider {
            provider: provider.into(),
            message: message.to_string(),
        })];
    }

    let mut events = Vec::new();
    if let Some(text) = first_choice(&v).and_then(text_of) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Text {
                text: text.to_string(),
            }));
        }
    }
    if let Some(usage) = v.get("usage").and_then(parse_openai_usage) {
        events.push(Ok(usage));
    }
    events
}

/// Chat chunk: `choices[0].delta.content`.
pub(crate) fn parse_chat_chunk(provider: &str, data: &str) -> Vec<Result<StreamEvent>> {
    parse_chunk(provider, data, |choice| {
        choice.get("delta").and_then(|d| d.get("content")).and_then(Value::as_str)
    })
}

/// Completion chunk: `choices[0].text`.
pub(crate) fn parse_completion_chunk(provider: &str, data: &str) -> Vec<Result<StreamEvent>> {
    parse_chunk(provider, data, |choice| choice.get("text").and_then(Value::as_str))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
