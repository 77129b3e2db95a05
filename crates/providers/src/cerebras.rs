//! Cerebras inference handler.
//!
//! OpenAI-compatible API at `api.cerebras.ai`. Besides chat it serves legacy
//! text completions, the model catalogue (filtered to [`CEREBRAS_MODELS`])
//! and single-model metadata.

use crate::openai_compat::{self, ApiKey, ChatParams, OpenAiCompatClient};
use crate::traits::{
    ApiHandler, CompletionOptions, HandlerCapabilities, MessageOptions, Prompt, RemoteModel,
};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::error::Result;
use mr_domain::message::Message;
use mr_domain::models::{self, ModelSelection, CEREBRAS_MODELS};
use mr_domain::stream::ApiStream;

const DEFAULT_BASE_URL: &str = "https://api.cerebras.ai/v1";

static CAPABILITIES: HandlerCapabilities = HandlerCapabilities {
    supports_json_output: true,
    supports_completion: true,
    supports_model_listing: true,
    supports_model_info: true,
};

pub struct CerebrasHandler {
    client: OpenAiCompatClient,
    model: ModelSelection,
}

impl CerebrasHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let api_key = ApiKey::Configured {
            value: options.cerebras_api_key.clone(),
            option_name: "cerebrasApiKey",
            env_var: "CEREBRAS_API_KEY",
        };
        Self {
            client: OpenAiCompatClient::new(
                "cerebras",
                util::base_url(options.cerebras_base_url.as_deref(), DEFAULT_BASE_URL),
                api_key,
            ),
            model: models::resolve(
                CEREBRAS_MODELS,
                options.cerebras_model_id.as_deref(),
                models::CEREBRAS_DEFAULT_MODEL_ID,
            ),
        }
    }
}

#[async_trait::async_trait]
impl ApiHandler for CerebrasHandler {
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
        ApiProvider::Cerebras
    }

    fn capabilities(&self) -> &HandlerCapabilities {
        &CAPABILITIES
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        self.client.list_models(CEREBRAS_MODELS).await
    }

    async fn get_model_info(&self, model_id: &str) -> Option<RemoteModel> {
        self.client.model_info(model_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_resolution() {
        let handler = CerebrasHandler::new(&ApiHandlerOptions::default());
        assert_eq!(handler.get_model().id, models::CEREBRAS_DEFAULT_MODEL_ID);

        let options = ApiHandlerOptions {
            cerebras_model_id: Some("llama3.1-70b".into()),
            ..Default::default()
        };
        let model = CerebrasHandler::new(&options).get_model();
        assert_eq!(model.id, "llama3.1-70b");
        assert_eq!(
            Some(&model.info),
            models::lookup(CEREBRAS_MODELS, "llama3.1-70b")
        );
    }

    #[test]
    fn every_optional_operation_is_supported() {
        let handler = CerebrasHandler::new(&ApiHandlerOptions::default());
        let caps = handler.capabilities();
        assert!(caps.supports_completion && caps.supports_model_listing && caps.supports_model_info);
        assert_eq!(handler.client.base_url(), DEFAULT_BASE_URL);
    }
}
