//! Static model descriptor tables.
//!
//! Every table-backed provider exposes a `*_MODELS` slice and a
//! `*_DEFAULT_MODEL_ID`. Handlers resolve their configured model against
//! these with [`resolve`]; a configured id that is not in the table falls
//! through to the default.

use serde::{Deserialize, Serialize};

/// Static metadata describing one model variant's limits and pricing.
///
/// Prices are dollars per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
    #[serde(default)]
    pub supports_images: bool,
    #[serde(default)]
    pub supports_prompt_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_price: Option<f64>,
}

impl ModelInfo {
    /// Estimated cost in USD for the given token counts, when priced.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> Option<f64> {
        let input = self.input_price?;
        let output = self.output_price?;
        Some((input_tokens as f64 * input + output_tokens as f64 * output) / 1_000_000.0)
    }
}

/// A model identifier paired with its descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub id: String,
    pub info: ModelInfo,
}

pub type ModelTable = &'static [(&'static str, ModelInfo)];

/// Find a model's descriptor in a table.
pub fn lookup(table: ModelTable, id: &str) -> Option<&'static ModelInfo> {
    table.iter().find(|(model_id, _)| *model_id == id).map(|(_, info)| info)
}

/// Pair the configured model with its descriptor, falling back to
/// `default_id` when the configured id is absent or unknown.
pub fn resolve(table: ModelTable, configured: Option<&str>, default_id: &str) -> ModelSelection {
    if let Some(id) = configured {
        if let Some(info) = lookup(table, id) {
            return ModelSelection { id: id.to_string(), info: *info };
        }
    }
    ModelSelection {
        id: default_id.to_string(),
        info: lookup(table, default_id).copied().unwrap_or_default(),
    }
}

/// Whether `id` is one of the table's model identifiers.
pub fn is_listed(table: ModelTable, id: &str) -> bool {
    lookup(table, id).is_some()
}

const fn info(
    max_tokens: u32,
    context_window: u32,
    supports_images: bool,
    supports_prompt_cache: bool,
    input_price: f64,
    output_price: f64,
) -> ModelInfo {
    ModelInfo {
        max_tokens: Some(max_tokens),
        context_window: Some(context_window),
        supports_images,
        supports_prompt_cache,
        input_price: Some(input_price),
        output_price: Some(output_price),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Anthropic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const ANTHROPIC_DEFAULT_MODEL_ID: &str = "claude-3-5-sonnet-20241022";

pub static ANTHROPIC_MODELS: ModelTable = &[
    ("claude-3-5-sonnet-20241022", info(8_192, 200_000, true, true, 3.0, 15.0)),
    ("claude-3-5-haiku-20241022", info(8_192, 200_000, false, true, 1.0, 5.0)),
    ("claude-3-opus-20240229", info(4_096, 200_000, true, true, 15.0, 75.0)),
    ("claude-3-haiku-20240307", info(4_096, 200_000, true, true, 0.25, 1.25)),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AWS Bedrock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const BEDROCK_DEFAULT_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20241022-v2:0";

pub static BEDROCK_MODELS: ModelTable = &[
    ("anthropic.claude-3-5-sonnet-20241022-v2:0", info(8_192, 200_000, true, false, 3.0, 15.0)),
    ("anthropic.claude-3-5-haiku-20241022-v1:0", info(8_192, 200_000, false, false, 1.0, 5.0)),
    ("anthropic.claude-3-5-sonnet-20240620-v1:0", info(8_192, 200_000, true, false, 3.0, 15.0)),
    ("anthropic.claude-3-opus-20240229-v1:0", info(4_096, 200_000, true, false, 15.0, 75.0)),
    ("anthropic.claude-3-haiku-20240307-v1:0", info(4_096, 200_000, true, false, 0.25, 1.25)),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Google Vertex (Anthropic models)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const VERTEX_DEFAULT_MODEL_ID: &str = "claude-3-5-sonnet-v2@20241022";

pub static VERTEX_MODELS: ModelTable = &[
    ("claude-3-5-sonnet-v2@20241022", info(8_192, 200_000, true, false, 3.0, 15.0)),
    ("claude-3-5-sonnet@20240620", info(8_192, 200_000, true, false, 3.0, 15.0)),
    ("claude-3-5-haiku@20241022", info(8_192, 200_000, false, false, 1.0, 5.0)),
    ("claude-3-opus@20240229", info(4_096, 200_000, true, false, 15.0, 75.0)),
    ("claude-3-haiku@20240307", info(4_096, 200_000, true, false, 0.25, 1.25)),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Google Gemini
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const GEMINI_DEFAULT_MODEL_ID: &str = "gemini-1.5-flash-002";

pub static GEMINI_MODELS: ModelTable = &[
    ("gemini-2.0-flash-exp", info(8_192, 1_048_576, true, false, 0.0, 0.0)),
    ("gemini-1.5-flash-002", info(8_192, 1_048_576, true, false, 0.0, 0.0)),
    ("gemini-1.5-pro-002", info(8_192, 2_097_152, true, false, 0.0, 0.0)),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OpenAI (native)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const OPENAI_NATIVE_DEFAULT_MODEL_ID: &str = "gpt-4o";

pub static OPENAI_NATIVE_MODELS: ModelTable = &[
    ("o1-preview", info(32_768, 128_000, true, false, 15.0, 60.0)),
    ("o1-mini", info(65_536, 128_000, true, false, 3.0, 12.0)),
    ("gpt-4o", info(4_096, 128_000, true, false, 2.5, 10.0)),
    ("gpt-4o-mini", info(16_384, 128_000, true, false, 0.15, 0.6)),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cerebras
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const CEREBRAS_DEFAULT_MODEL_ID: &str = "llama3.1-8b";

pub static CEREBRAS_MODELS: ModelTable = &[
    ("llama3.1-8b", info(8_192, 8_192, false, false, 0.1, 0.1)),
    ("llama3.1-70b", info(8_192, 8_192, false, false, 0.6, 0.6)),
    ("llama-3.3-70b", info(8_192, 8_192, false, false, 0.85, 1.2)),
];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Open-ended providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const OPENROUTER_DEFAULT_MODEL_ID: &str = "anthropic/claude-3.5-sonnet:beta";

pub const OPENROUTER_DEFAULT_MODEL_INFO: ModelInfo = info(8_192, 200_000, true, true, 3.0, 15.0);

/// Descriptor for OpenAI-compatible, Ollama and LM Studio models, whose
/// limits are unknown ahead of time.
pub const OPENAI_MODEL_INFO_SANE_DEFAULTS: ModelInfo = ModelInfo {
    max_tokens: None,
    context_window: Some(128_000),
    supports_images: true,
    supports_prompt_cache: false,
    input_price: Some(0.0),
    output_price: Some(0.0),
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_is_in_its_table() {
        for (table, default_id) in [
            (ANTHROPIC_MODELS, ANTHROPIC_DEFAULT_MODEL_ID),
            (BEDROCK_MODELS, BEDROCK_DEFAULT_MODEL_ID),
            (VERTEX_MODELS, VERTEX_DEFAULT_MODEL_ID),
            (GEMINI_MODELS, GEMINI_DEFAULT_MODEL_ID),
            (OPENAI_NATIVE_MODELS, OPENAI_NATIVE_DEFAULT_MODEL_ID),
            (CEREBRAS_MODELS, CEREBRAS_DEFAULT_MODEL_ID),
        ] {
            assert!(is_listed(table, default_id), "{default_id} missing from its table");
        }
    }

    #[test]
    fn resolve_keeps_known_configured_id() {
        let sel = resolve(CEREBRAS_MODELS, Some("llama3.1-70b"), CEREBRAS_DEFAULT_MODEL_ID);
        assert_eq!(sel.id, "llama3.1-70b");
        assert_eq!(sel.info.input_price, Some(0.6));
    }

    #[test]
    fn resolve_unknown_id_falls_back_to_default() {
        let sel = resolve(ANTHROPIC_MODELS, Some("claude-nope"), ANTHROPIC_DEFAULT_MODEL_ID);
        assert_eq!(sel.id, ANTHROPIC_DEFAULT_MODEL_ID);
        assert_eq!(sel.info.max_tokens, Some(8_192));
    }

    #[test]
    fn resolve_missing_id_falls_back_to_default() {
        let sel = resolve(GEMINI_MODELS, None, GEMINI_DEFAULT_MODEL_ID);
        assert_eq!(sel.id, GEMINI_DEFAULT_MODEL_ID);
    }

    #[test]
    fn estimate_cost_per_million() {
        let cost = info(1, 1, false, false, 3.0, 15.0)
            .estimate_cost(1_000_000, 100_000)
            .unwrap();
        assert!((cost - 4.5).abs() < 1e-9);
        assert!(ModelInfo::default().estimate_cost(10, 10).is_none());
    }

    #[test]
    fn model_info_deserializes_partial_camel_case() {
        let info: ModelInfo =
            serde_json::from_str(r#"{"maxTokens": 1024, "supportsImages": true}"#).unwrap();
        assert_eq!(info.max_tokens, Some(1024));
        assert!(info.supports_images);
        assert_eq!(info.context_window, None);
    }
}
