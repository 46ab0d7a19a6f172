use anyhow::Result;

use trendly_admin::{load_env, setup_tracing};
use trendly_discussion::store::connect;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    setup_tracing();

    let _db = connect(true, false, false).await?;

    tracing::info!("Database reset successfully");
    Ok(())
}
