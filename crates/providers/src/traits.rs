use mr_domain::config::ApiProvider;
use mr_domain::error::{Error, Result};
use mr_domain::message::Message;
use mr_domain::models::ModelSelection;
use mr_domain::stream::ApiStream;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-call options for [`ApiHandler::create_message`].
#[derive(Debug, Clone, Default)]
pub struct MessageOptions {
    /// Ask for the whole reply as JSON in one blocking call instead of
    /// incremental text. The stream then carries at most one text event.
    pub json_output: bool,
}

impl MessageOptions {
    pub fn json() -> Self {
        Self { json_output: true }
    }
}

/// Prompt input for [`ApiHandler::create_completion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Single(String),
    Batch(Vec<String>),
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt::Single(s.to_string())
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Prompt::Single(s)
    }
}

impl From<Vec<String>> for Prompt {
    fn from(v: Vec<String>) -> Self {
        Prompt::Batch(v)
    }
}

/// Generation parameters for a completion-style call.
///
/// Every field is independently defaulted when `None`: `max_tokens` to the
/// model's ceiling, `temperature` to 0, `top_p` to 1, `stream` to true,
/// `echo` to false; `stop`, `user` and `seed` are omitted from the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// A model as reported by a vendor's model listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModel {
    pub id: String,
    #[serde(default = "d_model")]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub owned_by: String,
}

fn d_model() -> String {
    "model".into()
}

/// Which optional operations and sub-modes a handler implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HandlerCapabilities {
    pub supports_json_output: bool,
    pub supports_completion: bool,
    pub supports_model_listing: bool,
    pub supports_model_info: bool,
}

/// Capabilities shared by handlers that only implement the required
/// operations.
pub static CHAT_ONLY: HandlerCapabilities = HandlerCapabilities {
    supports_json_output: true,
    supports_completion: false,
    supports_model_listing: false,
    supports_model_info: false,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core handler trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Uniform call surface every vendor adapter implements.
///
/// Handlers hold only immutable configuration and a cloneable client, so a
/// single instance can serve any number of calls. The optional operations
/// have default bodies reporting [`Error::Unsupported`]; check
/// [`ApiHandler::capabilities`] before relying on them.
#[async_trait::async_trait]
pub trait ApiHandler: Send + Sync {
    /// Start a chat-style completion.
    ///
    /// The returned stream is lazy: the single upstream call is made when it
    /// is first polled, and dropping it abandons the call.
    fn create_message(
        &self,
        system_prompt: &str,
        messages: &[Message],
        options: &MessageOptions,
    ) -> ApiStream;

    /// The configured model paired with its static descriptor.
    fn get_model(&self) -> ModelSelection;

    /// The vendor this handler talks to.
    fn provider(&self) -> ApiProvider;

    fn capabilities(&self) -> &HandlerCapabilities {
        &CHAT_ONLY
    }

    /// Free-form (non-chat) completion.
    fn create_completion(&self, _prompt: Prompt, _options: CompletionOptions) -> ApiStream {
        crate::util::failed_stream(self.unsupported("create_completion"))
    }

    /// Vendor models restricted to the ones this handler knows about.
    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        Err(self.unsupported("list_models"))
    }

    /// Vendor metadata for one model; `None` when it cannot be resolved.
    async fn get_model_info(&self, _model_id: &str) -> Option<RemoteModel> {
        None
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            provider: self.provider().to_string(),
            operation,
        }
    }
}
