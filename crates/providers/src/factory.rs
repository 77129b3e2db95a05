//! Handler factory.
//!
//! Maps an [`ApiConfiguration`] to the handler for its provider. Selection is
//! pure: no I/O happens and credentials are not checked until the handler is
//! first called. Unrecognized provider names were already mapped to the
//! default provider when the configuration was deserialized.

use crate::anthropic::AnthropicHandler;
use crate::bedrock::AwsBedrockHandler;
use crate::cerebras::CerebrasHandler;
use crate::gemini::GeminiHandler;
use crate::lmstudio::LmStudioHandler;
use crate::ollama::OllamaHandler;
use crate::openai::OpenAiHandler;
use crate::openai_native::OpenAiNativeHandler;
use crate::openrouter::OpenRouterHandler;
use crate::traits::ApiHandler;
use crate::vertex::VertexHandler;
use mr_domain::config::{ApiConfiguration, ApiProvider};

/// Build the handler selected by `configuration.api_provider`.
pub fn build_api_handler(configuration: &ApiConfiguration) -> Box<dyn ApiHandler> {
    let options = &configuration.options;
    let handler: Box<dyn ApiHandler> = match configuration.api_provider {
        ApiProvider::Anthropic => Box::new(AnthropicHandler::new(options)),
        ApiProvider::OpenRouter => Box::new(OpenRouterHandler::new(options)),
        ApiProvider::Bedrock => Box::new(AwsBedrockHandler::new(options)),
        ApiProvider::Vertex => Box::new(VertexHandler::new(options)),
        ApiProvider::OpenAi => Box::new(OpenAiHandler::new(options)),
        ApiProvider::Ollama => Box::new(OllamaHandler::new(options)),
        ApiProvider::LmStudio => Box::new(LmStudioHandler::new(options)),
        ApiProvider::Gemini => Box::new(GeminiHandler::new(options)),
        ApiProvider::OpenAiNative => Box::new(OpenAiNativeHandler::new(options)),
        ApiProvider::Cerebras => Box::new(CerebrasHandler::new(options)),
    };

    tracing::debug!(
        provider = %configuration.api_provider,
        model = %handler.get_model().id,
        "built API handler"
    );
    handler
}
