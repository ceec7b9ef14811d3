use std::time::Instant;

use books_etl::config::{WarehouseSettings, ZohoSettings};
use books_etl::error::Result;
use books_etl::warehouse::Warehouse;
use books_etl::zoho::{self, ZohoClient};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    info!("Books sync starting...");

    let warehouse_settings = WarehouseSettings::from_env()?;
    let zoho_settings = ZohoSettings::from_env()?;

    let started = Instant::now();

    let warehouse = Warehouse::connect(&warehouse_settings).await?;
    info!("Connected to warehouse");

    // The access token is valid for an hour, which covers a full run.
    let client = ZohoClient::authenticate(&zoho_settings).await?;

    zoho::run_all(&client, &warehouse).await;

    let elapsed = started.elapsed();
    info!(
        "Total time taken to complete the process: {} min {} sec",
        elapsed.as_secs() / 60,
        elapsed.as_secs() % 60
    );
    Ok(())
}
