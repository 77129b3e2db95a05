//! `modelrelay chat`: one-shot chat command.
//!
//! Sends a single message (optionally after earlier turns loaded from a JSON
//! file), streams the reply to stdout, and exits.

use anyhow::Context;
use mr_domain::config::ApiConfiguration;
use mr_domain::message::Message;
use mr_providers::{build_api_handler, MessageOptions};

/// Read earlier turns from a JSON array of messages.
pub fn load_history(path: &str) -> anyhow::Result<Vec<Message>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
}

pub async fn run(
    config: &ApiConfiguration,
    system: &str,
    message: String,
    history: Option<&str>,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut messages = match history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };
    messages.push(Message::user(message));

    let handler = build_api_handler(config);
    if json_output && !handler.capabilities().supports_json_output {
        anyhow::bail!("provider {} does not support JSON output", handler.provider());
    }

    let options = MessageOptions { json_output };
    let model = handler.get_model().info;
    super::relay(handler.create_message(system, &messages, &options), &model).await
}
