//! OpenAI's own API.
//!
//! Models are restricted to [`OPENAI_NATIVE_MODELS`]. The o1 family does not
//! accept a `system` role, streaming, or sampling parameters, so for those
//! models the system prompt is sent as a user turn and the reply arrives in
//! one non-streaming call.

use crate::openai_compat::{self, ApiKey, ChatParams, OpenAiCompatClient};
use crate::traits::{ApiHandler, HandlerCapabilities, MessageOptions, RemoteModel};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::error::Result;
use mr_domain::message::Message;
use mr_domain::models::{self, ModelSelection, OPENAI_NATIVE_MODELS};
use mr_domain::stream::ApiStream;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

static CAPABILITIES: HandlerCapabilities = HandlerCapabilities {
    supports_json_output: true,
    supports_completion: false,
    supports_model_listing: true,
    supports_model_info: true,
};

/// o1 models reject `response_format`.
static O1_CAPABILITIES: HandlerCapabilities = HandlerCapabilities {
    supports_json_output: false,
    supports_completion: false,
    supports_model_listing: true,
    supports_model_info: true,
};

pub struct OpenAiNativeHandler {
    client: OpenAiCompatClient,
    model: ModelSelection,
    capabilities: &'static HandlerCapabilities,
}

impl OpenAiNativeHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let api_key = ApiKey::Configured {
            value: options.open_ai_native_api_key.clone(),
            option_name: "openAiNativeApiKey",
            env_var: "OPENAI_API_KEY",
        };
        let model = models::resolve(
            OPENAI_NATIVE_MODELS,
            options.api_model_id.as_deref(),
            models::OPENAI_NATIVE_DEFAULT_MODEL_ID,
        );
        let capabilities = if is_o1_family(&model.id) { &O1_CAPABILITIES } else { &CAPABILITIES };
        Self {
            client: OpenAiCompatClient::new(
                "openai-native",
                util::base_url(options.open_ai_native_base_url.as_deref(), DEFAULT_BASE_URL),
                api_key,
            ),
            model,
            capabilities,
        }
    }
}

/// o1-family ids (`o1`, `o1-preview`, `o1-mini`, dated variants).
fn is_o1_family(model_id: &str) -> bool {
    model_id == "o1" || model_id.starts_with("o1-")
}

fn chat_params(model: &ModelSelection, options: &MessageOptions) -> ChatParams {
    if is_o1_family(&model.id) {
        if options.json_output {
            tracing::debug!(model = %model.id, "o1 models have no JSON mode, sending a plain request");
        }
        ChatParams {
            model: model.id.clone(),
            ..Default::default()
        }
    } else {
        ChatParams {
            model: model.id.clone(),
            max_tokens: model.info.max_tokens,
            temperature: Some(0.0),
            stream: !options.json_output,
            json_output: options.json_output,
            include_usage: true,
        }
    }
}

#[async_trait::async_trait]
impl ApiHandler for OpenAiNativeHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let system_role = if is_o1_family(&self.model.id) { "user" } else { "system" };
        let messages = openai_compat::to_openai_messages(system_prompt, system_role, messages);
        let params = chat_params(&self.model, options);
        self.client.chat(openai_compat::chat_body(&params, messages))
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::OpenAiNative
    }

    fn capabilities(&self) -> &HandlerCapabilities {
        self.capabilities
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        self.client.list_models(OPENAI_NATIVE_MODELS).await
    }

    async fn get_model_info(&self, model_id: &str) -> Option<RemoteModel> {
        self.client.model_info(model_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn o1_models_are_detected() {
        assert!(is_o1_family("o1-preview"));
        assert!(is_o1_family("o1-mini"));
        assert!(is_o1_family("o1"));
        assert!(!is_o1_family("gpt-4o"));
        assert!(!is_o1_family("o10-hypothetical"));
    }

    #[test]
    fn o1_requests_are_non_streaming_without_sampling() {
        let model = models::resolve(OPENAI_NATIVE_MODELS, Some("o1-mini"), "gpt-4o");
        let params = chat_params(&model, &MessageOptions::default());
        let body = openai_compat::chat_body(&params, vec![]);
        assert_eq!(body["stream"], false);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn json_output_capability_follows_the_model() {
        let o1 = OpenAiNativeHandler::new(&ApiHandlerOptions {
            api_model_id: Some("o1-mini".into()),
            ..Default::default()
        });
        assert!(!o1.capabilities().supports_json_output);
        assert!(o1.capabilities().supports_model_listing);

        let gpt = OpenAiNativeHandler::new(&ApiHandlerOptions::default());
        assert!(gpt.capabilities().supports_json_output);
    }

    #[test]
    fn gpt4o_streams_with_usage() {
        let model = models::resolve(OPENAI_NATIVE_MODELS, None, models::OPENAI_NATIVE_DEFAULT_MODEL_ID);
        let params = chat_params(&model, &MessageOptions::default());
        let body = openai_compat::chat_body(&params, vec![]);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn o1_system_prompt_becomes_user_turn() {
        let msgs = openai_compat::to_openai_messages("rules", "user", &[Message::user("hi")]);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["content"], "rules");
    }
}
