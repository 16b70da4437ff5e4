use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use lodestar_cli::{
    cli::{Cli, Commands},
    commands, config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging. RUST_LOG directives win over the flag.
    let level: LevelFilter = cli.effective_log_level().into();
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::CliConfig::load(cli.config, cli.timeout_ms)?;
    debug!(timeout_ms = config.bridge.request_timeout_ms, "configuration loaded");

    match cli.command {
        Commands::Demo {
            plugins,
            drop_camera,
        } => commands::demo::execute(config, plugins, drop_camera).await?,
        Commands::Catalog { format } => commands::catalog::execute(&format)?,
        Commands::Config => commands::config::execute(&config)?,
    }

    Ok(())
}
