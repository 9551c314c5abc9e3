use anyhow::Error;
use clap::Parser;
use common_blob::BlobLocator;
use envconfig::Envconfig;
use event_loader::{config::Config, context::AppContext};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Load tracking event blobs into the warehouse, one transaction per blob.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Blobs to ingest, as s3://bucket/key or bucket/key
    #[arg(required = true)]
    locators: Vec<BlobLocator>,
}

fn setup_tracing() {
    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

#[tokio::main]
pub async fn main() -> Result<(), Error> {
    setup_tracing();
    let args = Args::parse();

    let config = Config::init_from_env()?;
    let context = AppContext::new(&config).await?;

    let mut failed = 0;
    for locator in &args.locators {
        let report = context.pipeline.ingest(locator).await;
        if !report.decode_failures.is_empty() {
            info!(
                "{}: {} of {} tokens could not be decoded",
                locator,
                report.decode_failures.len(),
                report.tokens_seen
            );
        }
        if let Err(e) = report.into_result() {
            error!("{}: {}", locator, e);
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} blobs were not loaded", failed, args.locators.len());
    }

    info!("loaded {} blobs", args.locators.len());
    Ok(())
}
