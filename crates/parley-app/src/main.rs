//! Parley application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Fold in environment and flag overrides, then validate
//! 3. Build the chat orchestrator over the HTTP transport
//! 4. Run the line-oriented host on stdin/stdout

mod cli;
mod host;

use clap::Parser;
use parley_chat::ChatOrchestrator;
use parley_core::ParleyConfig;
use tokio::io::BufReader;

use crate::cli::CliArgs;
use crate::host::Host;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ParleyConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    args.apply_overrides(&mut config);

    // Tracing. Logs go to stderr so they never interleave with the chat.
    let directive = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&directive)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let orchestrator = ChatOrchestrator::new(&config)?;
    tracing::info!(
        chat_endpoint = %config.upstream.chat_endpoint,
        timeout_secs = config.upstream.timeout_secs,
        "Chat orchestrator ready"
    );

    let mut host = Host::new(orchestrator, config.general.user_id.clone())
        .with_export_dir(std::env::current_dir()?);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    host.run(stdin, &mut stdout).await?;

    tracing::info!(
        user = host.user_id(),
        messages = host.session().history().len(),
        "Parley shut down"
    );
    Ok(())
}
