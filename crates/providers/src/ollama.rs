//! Ollama through its OpenAI-compatible `/v1` surface.

use crate::openai_compat::{self, ApiKey, ChatParams, OpenAiCompatClient};
use crate::traits::{ApiHandler, MessageOptions};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::message::Message;
use mr_domain::models::{ModelSelection, OPENAI_MODEL_INFO_SANE_DEFAULTS};
use mr_domain::stream::ApiStream;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaHandler {
    client: OpenAiCompatClient,
    model: ModelSelection,
}

impl OllamaHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let base = util::base_url(options.ollama_base_url.as_deref(), DEFAULT_BASE_URL);
        Self {
            // Ollama ignores the token but the OpenAI contract requires one.
            client: OpenAiCompatClient::new("ollama", format!("{base}/v1"), ApiKey::Fixed("ollama")),
            model: ModelSelection {
                id: options.ollama_model_id.clone().unwrap_or_default(),
                info: OPENAI_MODEL_INFO_SANE_DEFAULTS,
            },
        }
    }
}

#[async_trait::async_trait]
impl ApiHandler for OllamaHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let params = ChatParams {
            model: self.model.id.clone(),
            temperature: Some(0.0),
            stream: !options.json_output,
            json_output: options.json_output,
            ..Default::default()
        };
        let messages = openai_compat::to_openai_messages(system_prompt, "system", messages);
        self.client.chat(openai_compat::chat_body(&params, messages))
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::Ollama
    }
}
