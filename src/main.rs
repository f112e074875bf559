use std::sync::Arc;

use clap::{Parser, Subcommand};
use relaywatch::{
    cmd::{cycle, CycleArgs},
    config::AppConfig,
    notifier::email::EmailNotifier,
    persistence::sqlite::SqliteWatchRepository,
    providers::directory::HttpDirectorySource,
    supervisor::Supervisor,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing app.yaml.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the monitoring supervisor.
    Run,
    /// Performs a single poll cycle and exits.
    Cycle(CycleArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_supervisor(cli.config_dir.as_deref()).await?,
        Commands::Cycle(args) => cycle::execute(cli.config_dir.as_deref(), args).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(
        database_url = %config.database_url,
        directory_url = %config.directory_url,
        poll_interval_secs = config.poll_interval_secs.as_secs(),
        "Configuration loaded."
    );

    let repository = Arc::new(SqliteWatchRepository::new(&config.database_url).await?);
    repository.run_migrations().await?;

    let source = Arc::new(HttpDirectorySource::new(
        config.directory_url.clone(),
        &config.directory_client,
        &config.directory_retry,
    )?);
    tracing::info!(retry_policy = ?config.directory_retry, "Directory status source ready.");

    let notifier = Arc::new(EmailNotifier::new(&config.smtp)?);
    tracing::info!(smtp_host = %config.smtp.host, "Email notifier ready.");

    let supervisor = Supervisor::builder()
        .config(config)
        .repository(repository)
        .source(source)
        .notifier(notifier)
        .build()
        .await?;

    tracing::info!("Starting relay monitoring.");
    supervisor.run().await?;

    Ok(())
}
