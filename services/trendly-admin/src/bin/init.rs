use anyhow::Result;

use trendly_admin::{load_env, setup_tracing};
use trendly_discussion::store::connect;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    setup_tracing();

    let run_migrations = true;
    let _db = connect(false, true, run_migrations).await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}
