use clap::Parser;
use tracing_subscriber::EnvFilter;

use mr_cli::cli::complete::CompleteArgs;
use mr_cli::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("modelrelay {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_cli_tracing();
    let (config, config_path) = mr_cli::cli::load_config(cli.config.as_deref())?;
    tracing::debug!(path = %config_path, provider = %config.api_provider, "loaded configuration");

    match cli.command {
        Command::Chat { message, system, history, json } => {
            mr_cli::cli::chat::run(&config, &system, message, history.as_deref(), json).await
        }
        Command::Complete {
            prompts,
            max_tokens,
            temperature,
            top_p,
            no_stream,
            echo,
            stop,
            user,
            seed,
        } => {
            let args = CompleteArgs {
                prompts,
                max_tokens,
                temperature,
                top_p,
                no_stream,
                echo,
                stop,
                user,
                seed,
            };
            mr_cli::cli::complete::run(&config, args).await
        }
        Command::Model => mr_cli::cli::models::show_model(&config),
        Command::Models => mr_cli::cli::models::list(&config).await,
        Command::ModelInfo { id } => mr_cli::cli::models::info(&config, &id).await,
        Command::Version => Ok(()),
    }
}

/// Initialize compact stderr-only tracing.
///
/// Defaults to `warn` level so diagnostic output does not pollute stdout.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
