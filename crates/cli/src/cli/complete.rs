use mr_domain::config::ApiConfiguration;
use mr_providers::{build_api_handler, CompletionOptions, Prompt};

/// Raw `complete` arguments, before defaults are applied.
#[derive(Debug, Default)]
pub struct CompleteArgs {
    pub prompts: Vec<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub no_stream: bool,
    pub echo: bool,
    pub stop: Vec<String>,
    pub user: Option<String>,
    pub seed: Option<i64>,
}

impl CompleteArgs {
    /// A single prompt is sent as a string, several as a list.
    pub fn prompt(&self) -> Prompt {
        match self.prompts.as_slice() {
            [single] => Prompt::Single(single.clone()),
            many => Prompt::Batch(many.to_vec()),
        }
    }

    /// Only flags the user actually passed are set; the handler fills in
    /// the rest.
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stream: self.no_stream.then_some(false),
            echo: self.echo.then_some(true),
            stop: (!self.stop.is_empty()).then(|| self.stop.clone()),
            user: self.user.clone(),
            seed: self.seed,
        }
    }
}

pub async fn run(config: &ApiConfiguration, args: CompleteArgs) -> anyhow::Result<()> {
    let handler = build_api_handler(config);
    if !handler.capabilities().supports_completion {
        anyhow::bail!("provider {} does not support completions", handler.provider());
    }
    let model = handler.get_model().info;
    super::relay(handler.create_completion(args.prompt(), args.options()), &model).await
}
