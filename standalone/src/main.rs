use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bmr_coordinator::{Coordinator, LocalStore, S3Store};
use common::minio;

mod args;
use args::Args;

mod runner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match &args.store_url {
        Some(location) => {
            info!("keeping chunks under {location}");
            let client = minio::Client::from_conf(args.minio_config());
            let coordinator = Coordinator::new(S3Store::new(client, location)?);
            runner::run(coordinator, &args).await
        }
        None => {
            info!("keeping chunks in {}", args.store_dir.display());
            let coordinator = Coordinator::new(LocalStore::open(&args.store_dir).await?);
            runner::run(coordinator, &args).await
        }
    }
}
