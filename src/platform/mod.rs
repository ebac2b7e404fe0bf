//! Platform catalog: record model, prompts, and the LLM-driven updater

mod model;
mod prompts;
mod updater;

pub use model::{Features, Platform, group_by_category};
pub use updater::{PlatformUpdater, UpdateOptions};

use crate::store::{DocumentStore, StoreError};
use tracing::warn;

/// Load every platform in `collection`
///
/// Documents that cannot be read as platforms are logged and left out.
pub async fn load_platforms(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<Platform>, StoreError> {
    let docs = store.list(collection).await?;
    let mut platforms = Vec::with_capacity(docs.len());
    for doc in &docs {
        match Platform::from_document(doc) {
            Ok(platform) => platforms.push(platform),
            Err(e) => warn!("Skipping unreadable document {}: {}", doc.id, e),
        }
    }
    Ok(platforms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Patch, SqliteStore};

    #[tokio::test]
    async fn test_load_platforms_sets_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create(
                "platforms",
                None,
                &Patch::new().set("name", "Etsy").set("category", "E-Commerce & Marketplace"),
            )
            .await
            .unwrap();

        let platforms = load_platforms(&store, "platforms").await.unwrap();
        assert_eq!(platforms.len(), 1);
        assert_eq!(platforms[0].id.as_deref(), Some(id.as_str()));
        assert_eq!(platforms[0].category(), "E-Commerce & Marketplace");
    }
}
