use anyhow::Result;

use trendly_admin::{load_env, setup_tracing};
use trendly_discussion::store::connect;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    setup_tracing();

    // additive only: columns are added and nullability reconciled, nothing is dropped
    let _db = connect(false, false, true).await?;

    tracing::info!("Database migrated successfully");
    Ok(())
}
