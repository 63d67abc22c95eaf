use anyhow::Context;
use econ_panel::core::{scheduler, seeder};
use econ_panel::{db, fetcher, server};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".into()));
    let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".into())
        .parse()
        .context("invalid BIND_ADDR")?;

    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir).context("creating data directory")?;
    }

    let pool = db::init(&data_dir).await?;
    seeder::seed_registry(&pool).await?;

    let client = fetcher::build_client();

    // Warm the store before the query API serves its first request.
    info!("Running startup sync");
    scheduler::sync_all(&pool, &client).await;

    let _sched = scheduler::init(pool.clone(), client.clone()).await?;

    server::serve(pool, bind_addr).await
}
