//! Model metadata commands: `model`, `models`, `model-info`.

use mr_domain::config::ApiConfiguration;
use mr_providers::build_api_handler;

/// Print the configured model id and descriptor as JSON.
pub fn show_model(config: &ApiConfiguration) -> anyhow::Result<()> {
    let handler = build_api_handler(config);
    println!("{}", serde_json::to_string_pretty(&handler.get_model())?);
    Ok(())
}

pub async fn list(config: &ApiConfiguration) -> anyhow::Result<()> {
    let handler = build_api_handler(config);
    if !handler.capabilities().supports_model_listing {
        anyhow::bail!("provider {} does not support model listing", handler.provider());
    }
    let models = handler.list_models().await?;
    println!("{}", serde_json::to_string_pretty(&models)?);
    Ok(())
}

/// Print the vendor's metadata for `model_id`, or `null` when unknown.
pub async fn info(config: &ApiConfiguration, model_id: &str) -> anyhow::Result<()> {
    let handler = build_api_handler(config);
    if !handler.capabilities().supports_model_info {
        anyhow::bail!("provider {} does not support model info", handler.provider());
    }
    let model = handler.get_model_info(model_id).await;
    println!("{}", serde_json::to_string_pretty(&model)?);
    Ok(())
}
