//! Generic OpenAI-compatible endpoint.
//!
//! Any server implementing the chat and completions contract: vLLM, TGI,
//! LiteLLM, Azure deployments behind a proxy, and so on. The model id is
//! taken verbatim from configuration and paired with permissive defaults.

use crate::openai_compat::{self, ApiKey, ChatParams, OpenAiCompatClient};
use crate::traits::{ApiHandler, CompletionOptions, HandlerCapabilities, MessageOptions, Prompt};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::message::Message;
use mr_domain::models::{ModelSelection, OPENAI_MODEL_INFO_SANE_DEFAULTS};
use mr_domain::stream::ApiStream;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static CAPABILITIES: HandlerCapabilities = HandlerCapabilities {
    supports_json_output: true,
    supports_completion: true,
    supports_model_listing: false,
    supports_model_info: false,
};

pub struct OpenAiHandler {
    client: OpenAiCompatClient,
    model: ModelSelection,
}

impl OpenAiHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let api_key = ApiKey::Configured {
            value: options.open_ai_api_key.clone(),
            option_name: "openAiApiKey",
            env_var: "OPENAI_API_KEY",
        };
        Self {
            client: OpenAiCompatClient::new(
                "openai",
                util::base_url(options.open_ai_base_url.as_deref(), DEFAULT_BASE_URL),
                api_key,
            ),
            model: ModelSelection {
                id: options.open_ai_model_id.clone().unwrap_or_default(),
                info: OPENAI_MODEL_INFO_SANE_DEFAULTS,
            },
        }
    }
}

#[async_trait::async_trait]
impl ApiHandler for OpenAiHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let params = ChatParams {
            model: self.model.id.clone(),
            max_tokens: self.model.info.max_tokens,
            temperature: Some(0.0),
            stream: !options.json_output,
            json_output: options.json_output,
            include_usage: false,
        };
        let messages = openai_compat::to_openai_messages(system_prompt, "system", messages);
        self.client.chat(openai_compat::chat_body(&params, messages))
    }

    fn create_completion(&self, prompt: Prompt, options: CompletionOptions) -> ApiStream {
        let body = openai_compat::completion_body(
            &self.model.id,
            &prompt,
            &options,
            self.model.info.max_tokens,
        );
        self.client.completion(body)
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::OpenAi
    }

    fn capabilities(&self) -> &HandlerCapabilities {
        &CAPABILITIES
    }
}
