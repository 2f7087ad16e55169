use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use event_embeddings::{Cli, Commands, Container, ContainerConfig, Router};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.settings.into_config();
    config.validate()?;
    info!("{}", config);

    let container = Container::new(ContainerConfig {
        app: config,
        mock_embeddings: cli.mock_embeddings,
        dry_run: cli.dry_run,
        show_progress: !cli.no_progress,
    })
    .await?;

    let command = cli.command.unwrap_or(Commands::Sync { mode: None });
    let result = Router::new(&container).route(command).await;
    container.close().await;

    match result {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}
