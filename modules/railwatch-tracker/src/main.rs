use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use railwatch_common::Config;
use railwatch_tracker::extractor::ClaudeExtractor;
use railwatch_tracker::fra::{FraReconciler, SodaClient};
use railwatch_tracker::notify::WebhookNotifier;
use railwatch_tracker::pipeline::PipelineOrchestrator;
use railwatch_tracker::store::JsonFileStore;
use railwatch_tracker::suppliers::RssSupplier;
use railwatch_tracker::traits::Notifier;

#[derive(Parser)]
#[command(name = "railwatch")]
#[command(about = "Passenger-rail fatality tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection cycle: fetch news, extract, dedup, merge.
    Detect,
    /// Reconcile the ledger against the federal casualty dataset.
    Reconcile,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("railwatch=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect => detect().await,
        Commands::Reconcile => reconcile().await,
    }
}

async fn detect() -> Result<()> {
    info!("Railwatch detection starting...");
    let config = Config::from_env();

    let supplier = RssSupplier::new();
    let extractor = ClaudeExtractor::new(
        &config.anthropic_api_key,
        &config.extraction_model,
        &config.tracker,
    );
    let store = JsonFileStore::new(&config.ledger_path);
    let notifier = config.notify_webhook_url.as_deref().map(WebhookNotifier::new);

    let orchestrator = PipelineOrchestrator::new(
        &supplier,
        &extractor,
        &store,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        config.tracker,
    );

    let summary = orchestrator.run().await?;
    println!("{summary}");
    Ok(())
}

async fn reconcile() -> Result<()> {
    info!("Railwatch reconciliation starting...");
    let config = Config::reconcile_from_env();

    let dataset = SodaClient::new(config.fra_app_token.clone());
    let store = JsonFileStore::new(&config.ledger_path);

    let reconciler = FraReconciler::new(&dataset, &store, &config.tracker);
    let stats = reconciler.run().await?;
    println!("{stats}");
    Ok(())
}
