//! Anthropic models on Google Vertex AI.
//!
//! Same Messages API body and SSE event stream as [`crate::anthropic`], sent
//! to the publisher model's `streamRawPredict` (or `rawPredict`) endpoint
//! with an OAuth bearer token. The model is addressed by the URL, so the body
//! carries `anthropic_version` instead of `model`.

use crate::anthropic::{self, FALLBACK_MAX_TOKENS};
use crate::traits::{ApiHandler, MessageOptions};
use crate::util;
use mr_domain::config::{ApiHandlerOptions, ApiProvider};
use mr_domain::error::{Error, Result};
use mr_domain::message::Message;
use mr_domain::models::{self, ModelSelection};
use mr_domain::stream::ApiStream;
use serde_json::Value;

const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
const DEFAULT_REGION: &str = "us-east5";
const ACCESS_TOKEN_ENV: &str = "VERTEX_ACCESS_TOKEN";

pub struct VertexHandler {
    project_id: Option<String>,
    region: String,
    base_url: String,
    access_token: Option<String>,
    model: ModelSelection,
    client: reqwest::Client,
}

impl VertexHandler {
    pub fn new(options: &ApiHandlerOptions) -> Self {
        let region = options
            .vertex_region
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let default_base = format!("https://{region}-aiplatform.googleapis.com");
        Self {
            project_id: options.vertex_project_id.clone().filter(|p| !p.is_empty()),
            base_url: util::base_url(options.vertex_base_url.as_deref(), &default_base),
            region,
            access_token: options.vertex_access_token.clone(),
            model: models::resolve(
                models::VERTEX_MODELS,
                options.api_model_id.as_deref(),
                models::VERTEX_DEFAULT_MODEL_ID,
            ),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, project_id: &str, streaming: bool) -> String {
        let method = if streaming { "streamRawPredict" } else { "rawPredict" };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:{}",
            self.base_url, project_id, self.region, self.model.id, method
        )
    }

    fn request(&self, body: &Value, streaming: bool) -> Result<reqwest::RequestBuilder> {
        let project_id = self.project_id.as_deref().ok_or_else(|| {
            Error::Config("vertex handler requires 'vertexProjectId'".into())
        })?;
        let token = util::resolve_api_key(
            self.access_token.as_deref(),
            "vertexAccessToken",
            ACCESS_TOKEN_ENV,
        )?;
        let url = self.url(project_id, streaming);
        tracing::debug!(provider = "vertex", url = %url, "vertex request");
        Ok(self.client.post(url).bearer_auth(token).json(body))
    }
}

#[async_trait::async_trait]
impl ApiHandler for VertexHandler {
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream {
        let streaming = !options.json_output;
        let max_tokens = self.model.info.max_tokens.unwrap_or(FALLBACK_MAX_TOKENS);
        let mut body = anthropic::messages_body(system_prompt, messages, max_tokens, streaming);
        body["anthropic_version"] = Value::String(VERTEX_ANTHROPIC_VERSION.into());
        anthropic::run("vertex", self.request(&body, streaming), streaming)
    }

    fn get_model(&self) -> ModelSelection {
        self.model.clone()
    }

    fn provider(&self) -> ApiProvider {
        ApiProvider::Vertex
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_publisher_model() {
        let options = ApiHandlerOptions {
            vertex_project_id: Some("proj".into()),
            vertex_region: Some("europe-west1".into()),
            ..Default::default()
        };
        let handler = VertexHandler::new(&options);
        assert_eq!(
            handler.url("proj", true),
            format!(
                "https://europe-west1-aiplatform.googleapis.com/v1/projects/proj/locations/europe-west1/publishers/anthropic/models/{}:streamRawPredict",
                models::VERTEX_DEFAULT_MODEL_ID
            )
        );
        assert!(handler.url("proj", false).ends_with(":rawPredict"));
    }

    #[test]
    fn missing_project_is_a_config_error() {
        let options = ApiHandlerOptions {
            vertex_access_token: Some("tok".into()),
            ..Default::default()
        };
        let handler = VertexHandler::new(&options);
        let err = handler.request(&serde_json::json!({}), true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
