use crate::models::ModelInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handler construction input: which provider to use plus every
/// provider-specific option, flattened into one camelCase record.
///
/// ```json
/// { "apiProvider": "cerebras", "cerebrasApiKey": "...", "cerebrasModelId": "llama3.1-70b" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfiguration {
    #[serde(default)]
    pub api_provider: ApiProvider,
    #[serde(flatten)]
    pub options: ApiHandlerOptions,
}

/// The provider discriminator.
///
/// Deserializing an unrecognized name or `null` yields the default provider
/// rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum ApiProvider {
    #[default]
    Anthropic,
    OpenRouter,
    Bedrock,
    Vertex,
    OpenAi,
    Ollama,
    LmStudio,
    Gemini,
    OpenAiNative,
    Cerebras,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 10] = [
        ApiProvider::Anthropic,
        ApiProvider::OpenRouter,
        ApiProvider::Bedrock,
        ApiProvider::Vertex,
        ApiProvider::OpenAi,
        ApiProvider::Ollama,
        ApiProvider::LmStudio,
        ApiProvider::Gemini,
        ApiProvider::OpenAiNative,
        ApiProvider::Cerebras,
    ];

    /// The wire name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProvider::Anthropic => "anthropic",
            ApiProvider::OpenRouter => "openrouter",
            ApiProvider::Bedrock => "bedrock",
            ApiProvider::Vertex => "vertex",
            ApiProvider::OpenAi => "openai",
            ApiProvider::Ollama => "ollama",
            ApiProvider::LmStudio => "lmstudio",
            ApiProvider::Gemini => "gemini",
            ApiProvider::OpenAiNative => "openai-native",
            ApiProvider::Cerebras => "cerebras",
        }
    }

    /// Parse a wire name, returning `None` for anything unrecognized.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl From<String> for ApiProvider {
    fn from(name: String) -> Self {
        Self::parse(&name).unwrap_or_else(|| {
            tracing::debug!(provider = %name, "unknown apiProvider, using default");
            Self::default()
        })
    }
}

impl From<Option<String>> for ApiProvider {
    fn from(name: Option<String>) -> Self {
        name.map(Self::from).unwrap_or_default()
    }
}

impl From<ApiProvider> for String {
    fn from(p: ApiProvider) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-provider options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Every provider-specific option. All fields are optional; missing
/// credentials surface as an error when the handler is first called, not
/// when it is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHandlerOptions {
    /// Model id shared by Anthropic, Bedrock, Vertex, Gemini and OpenAI native.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model_id: Option<String>,

    // ── Anthropic ──────────────────────────────────────────────────
    /// Anthropic API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_base_url: Option<String>,

    // ── OpenRouter ─────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_router_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_router_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_router_model_info: Option<ModelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_router_base_url: Option<String>,

    // ── AWS Bedrock ────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub aws_use_cross_region_inference: bool,

    // ── Google Vertex ──────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_region: Option<String>,
    /// OAuth bearer token (e.g. from `gcloud auth print-access-token`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_base_url: Option<String>,

    // ── OpenAI-compatible ──────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_model_id: Option<String>,

    // ── Ollama ─────────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama_base_url: Option<String>,

    // ── LM Studio ──────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_studio_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_studio_base_url: Option<String>,

    // ── Gemini ─────────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_base_url: Option<String>,

    // ── OpenAI native ──────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_native_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_ai_native_base_url: Option<String>,

    // ── Cerebras ───────────────────────────────────────────────────
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cerebras_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cerebras_model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cerebras_base_url: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for p in ApiProvider::ALL {
            assert_eq!(ApiProvider::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn unknown_provider_deserializes_to_default() {
        let p: ApiProvider = serde_json::from_str(r#""mystery-llm""#).unwrap();
        assert_eq!(p, ApiProvider::Anthropic);
    }

    #[test]
    fn provider_serializes_as_wire_name() {
        let json = serde_json::to_string(&ApiProvider::OpenAiNative).unwrap();
        assert_eq!(json, r#""openai-native""#);
    }

    #[test]
    fn configuration_flattens_options() {
        let json = r#"{
            "apiProvider": "cerebras",
            "cerebrasApiKey": "csk-1",
            "cerebrasModelId": "llama3.1-70b"
        }"#;
        let cfg: ApiConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.api_provider, ApiProvider::Cerebras);
        assert_eq!(cfg.options.cerebras_api_key.as_deref(), Some("csk-1"));
        assert_eq!(cfg.options.cerebras_model_id.as_deref(), Some("llama3.1-70b"));
        assert!(cfg.options.api_key.is_none());
    }

    #[test]
    fn missing_provider_uses_default() {
        let cfg: ApiConfiguration = serde_json::from_str(r#"{"apiKey": "sk-ant"}"#).unwrap();
        assert_eq!(cfg.api_provider, ApiProvider::Anthropic);
        assert_eq!(cfg.options.api_key.as_deref(), Some("sk-ant"));
    }
}
