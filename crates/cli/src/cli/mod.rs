pub mod chat;
pub mod complete;
pub mod models;

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use mr_domain::config::ApiConfiguration;
use mr_domain::models::ModelInfo;
use mr_domain::stream::{ApiStream, StreamEvent};

/// ModelRelay: one client for many LLM providers.
#[derive(Debug, Parser)]
#[command(name = "modelrelay", version, about)]
pub struct Cli {
    /// Path to the configuration file (TOML, or JSON with a `.json` extension).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a message and stream the reply to stdout.
    Chat {
        /// The message to send.
        message: String,
        /// System prompt.
        #[arg(long, default_value = "")]
        system: String,
        /// JSON file holding earlier conversation turns.
        #[arg(long)]
        history: Option<String>,
        /// Request the whole reply as JSON in one call.
        #[arg(long)]
        json: bool,
    },
    /// Run a text completion.
    Complete {
        /// One or more prompts.
        #[arg(required = true)]
        prompts: Vec<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        top_p: Option<f32>,
        /// Wait for the whole completion instead of streaming.
        #[arg(long)]
        no_stream: bool,
        /// Echo the prompt back before the completion.
        #[arg(long)]
        echo: bool,
        /// Stop sequence (repeatable).
        #[arg(long)]
        stop: Vec<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        seed: Option<i64>,
    },
    /// Print the configured model and its descriptor.
    Model,
    /// List the provider's models.
    Models,
    /// Look up one model's metadata.
    ModelInfo {
        /// Model identifier.
        id: String,
    },
    /// Print version information.
    Version,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Where the configuration comes from: `--config`, then `MR_CONFIG`, then
/// `modelrelay.toml`. The flag wins over the environment.
///
/// Returns the path and whether it was chosen explicitly.
pub fn resolve_config_path(flag: Option<&str>, env: Option<String>) -> (String, bool) {
    match (flag, env) {
        (Some(path), _) => (path.to_string(), true),
        (None, Some(path)) if !path.is_empty() => (path, true),
        _ => ("modelrelay.toml".to_string(), false),
    }
}

/// Load the configuration at `config_path`.
///
/// A missing default file yields the default configuration; a missing
/// explicitly chosen file is an error.
pub fn load_config_from(config_path: &str, explicit: bool) -> anyhow::Result<ApiConfiguration> {
    let path = Path::new(config_path);
    if !path.exists() {
        if explicit {
            anyhow::bail!("config file {config_path} not found");
        }
        tracing::debug!(path = %config_path, "no config file, using defaults");
        return Ok(ApiConfiguration::default());
    }

    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {config_path}"))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let config = if is_json {
        serde_json::from_str(&raw).with_context(|| format!("parsing {config_path}"))?
    } else {
        toml::from_str(&raw).with_context(|| format!("parsing {config_path}"))?
    };
    Ok(config)
}

/// Load the configuration for a CLI invocation. Returns the parsed
/// [`ApiConfiguration`] and the path that was used.
pub fn load_config(flag: Option<&str>) -> anyhow::Result<(ApiConfiguration, String)> {
    let (config_path, explicit) = resolve_config_path(flag, std::env::var("MR_CONFIG").ok());
    let config = load_config_from(&config_path, explicit)?;
    Ok((config, config_path))
}

// ── Output ────────────────────────────────────────────────────────────

/// Format a usage report, with a cost estimate when the model is priced.
pub fn usage_line(input_tokens: u32, output_tokens: u32, model: &ModelInfo) -> String {
    match model.estimate_cost(input_tokens, output_tokens) {
        Some(cost) => format!("[usage: {input_tokens} in / {output_tokens} out, ~${cost:.4}]"),
        None => format!("[usage: {input_tokens} in / {output_tokens} out]"),
    }
}

/// Drain a handler stream: text to stdout as it arrives, usage to stderr.
///
/// The first error ends the stream and is returned.
pub(crate) async fn relay(mut stream: ApiStream, model: &ModelInfo) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    let mut wrote_text = false;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Text { text } => {
                print!("{text}");
                stdout.flush().ok();
                wrote_text = true;
            }
            StreamEvent::Usage { input_tokens, output_tokens } => {
                eprintln!("\x1b[2m{}\x1b[0m", usage_line(input_tokens, output_tokens, model));
            }
        }
    }

    if wrote_text {
        println!();
    }
    Ok(())
}
