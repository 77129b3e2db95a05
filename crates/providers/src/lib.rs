pub mod anthropic;
pub mod bedrock;
pub mod cerebras;
pub mod factory;
pub mod gemini;
pub mod lmstudio;
pub mod ollama;
pub mod openai;
pub mod openai_native;
pub mod openrouter;
pub mod traits;
pub mod vertex;
pub(crate) mod openai_compat;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use factory::build_api_handler;
pub use traits::{
    ApiHandler, CompletionOptions, HandlerCapabilities, MessageOptions, Prompt, RemoteModel,
};
