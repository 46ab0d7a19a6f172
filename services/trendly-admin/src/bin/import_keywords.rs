use anyhow::{bail, Result};

use trendly_admin::{load_env, load_keywords_file, setup_tracing};
use trendly_common::ModuleClient;
use trendly_discussion::{DiscussionStore, PgDiscussionStore, PostgresClient};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    setup_tracing();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: import_keywords <file.json>");
    };
    let keywords = load_keywords_file(&path)?;
    tracing::info!("Importing {} keywords from {}", keywords.len(), path);

    let client = PostgresClient::setup_connection().await?;
    let store = PgDiscussionStore::from_client(&client);

    let mut imported = 0usize;
    for keyword in keywords {
        let text = keyword.keyword.clone();
        match store.track_keyword(keyword).await {
            Ok(tracked) => {
                imported += 1;
                tracing::debug!("Tracked '{}' as {}", tracked.keyword, tracked.id);
            }
            Err(e) => tracing::warn!("Skipping keyword '{}': {}", text, e),
        }
    }

    tracing::info!("Imported {} keywords", imported);
    Ok(())
}
