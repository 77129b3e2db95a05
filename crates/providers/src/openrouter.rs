//! OpenRouter handler.
//!
//! OpenRouter proxies many vendors behind one OpenAI-compatible API and
//! identifies calling apps through the `HTTP-Referer` and `X-Title` headers.
//! Its catalogue changes too often for a static table, so the model
//! descriptor comes from configuration alongside the id.

use crate::openai_compat::{self, ApiKey, ChatParams, OpenAiCompatClient};
use crate::traits::{ApiHandler, MessageOptions};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::message::Message;
use mr_domain::models::{ModelSelection, OPENROUTER_DEFAULT_MODEL_ID, OPENROUTER_DEFAULT_MODEL_INFO};
use mr_domain::stream::ApiStream;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const APP_REFERER: &str = "modelrelay";
const APP_TITLE: &str = "ModelRelay";

pub struct OpenRouterHandler {
    client: OpenAiCompatClient,
    model: ModelSelection,
}

impl OpenRouterHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let api_key = ApiKey::Configured {
            value: options.open_router_api_key.clone(),
            option_name: "openRouterApiKey",
            env_var: "OPENROUTER_API_KEY",
        };
        let client = OpenAiCompatClient::new(
            "openrouter",
            util::base_url(options.open_router_base_url.as_deref(), DEFAULT_BASE_URL),
            api_key,
        )
        .with_header("HTTP-Referer", APP_REFERER)
        .with_header("X-Title", APP_TITLE);

        Self {
            client,
            model: configured_model(options),
        }
    }
}

/// Id and descriptor are used only as a pair; either one missing selects
/// the default model.
fn configured_model(options: &ApiHandlerOptions) -> ModelSelection {
    match (&options.open_router_model_id, &options.open_router_model_info) {
        (Some(id), Some(info)) if !id.is_empty() => ModelSelection {
            id: id.clone(),
            info: *info,
        },
        _ => ModelSelection {
            id: OPENROUTER_DEFAULT_MODEL_ID.to_string(),
            info: OPENROUTER_DEFAULT_MODEL_INFO,
        },
    }
}

#[async_trait::async_trait]
impl ApiHandler for OpenRouterHandler {
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

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::OpenRouter
    }
}
