use crate::openai_compat::{self, ApiKey, ChatParams, OpenAiCompatClient};
use crate::traits::{ApiHandler, MessageOptions};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::message::Message;
use mr_domain::models::{ModelSelection, OPENAI_MODEL_INFO_SANE_DEFAULTS};
use mr_domain::stream::ApiStream;

const DEFAULT_BASE_URL: &str = "http://localhost:1234";

/// LM Studio's local server, OpenAI-compatible under `/v1`.
pub struct LmStudioHandler {
    client: OpenAiCompatClient,
    model: ModelSelection,
}

impl LmStudioHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let base = util::base_url(options.lm_studio_base_url.as_deref(), DEFAULT_BASE_URL);
        Self {
            client: OpenAiCompatClient::new("lmstudio", format!("{base}/v1"), ApiKey::Fixed("noop")),
            model: ModelSelection {
                id: options.lm_studio_model_id.clone().unwrap_or_default(),
                info: OPENAI_MODEL_INFO_SANE_DEFAULTS,
            },
        }
    }
}

#[async_trait::async_trait]
impl ApiHandler for LmStudioHandler {
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
        ApiProvider::LmStudio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_override_gets_v1_suffix() {
        let options = ApiHandlerOptions {
            lm_studio_base_url: Some("http://gpu-box:1234/".into()),
            lm_studio_model_id: Some("qwen2.5-coder".into()),
            ..Default::default()
        };
        let handler = LmStudioHandler::new(&options);
        assert_eq!(handler.client.base_url(), "http://gpu-box:1234/v1");
        assert_eq!(handler.get_model().id, "qwen2.5-coder");
    }
}
