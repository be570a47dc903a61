mod cli;
mod commands;
mod output;

use anyhow::Result;
use cli::{Cli, Command, LogFormat};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false);
    match cli.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    let backend = cli.backend_settings();
    match cli.command {
        Command::Validate { path } => commands::validate(path),
        Command::Plan { path, output } => commands::plan(path, output, backend).await,
        Command::Apply { path, output } => commands::apply(path, output, backend).await,
        Command::Show { pool_id, provider_id } => {
            commands::show(pool_id, provider_id, backend).await
        }
        Command::Destroy { pool_id, provider_id, yes } => {
            commands::destroy(pool_id, provider_id, yes, backend).await
        }
        Command::Verify { steps, ignore } => commands::verify(steps, ignore, backend).await,
    }
}
