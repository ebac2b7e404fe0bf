//! Collection-addressed document storage
//!
//! [`DocumentStore`] is the seam between the jobs and the database. The
//! production backend is Firestore; the SQLite backend keeps the same
//! semantics on disk for offline runs.

mod firestore_store;
mod schema;
mod sqlite_store;
mod types;

pub use firestore_store::FirestoreStore;
pub use sqlite_store::SqliteStore;
pub use types::{Document, DocumentStore, Fields, Patch, StoreError, auto_id};

use tracing::info;

/// Delete every document in `collection`, `batch_size` deletes per commit
///
/// Returns the number of deleted documents.
pub async fn clear_collection(
    store: &dyn DocumentStore,
    collection: &str,
    batch_size: usize,
) -> Result<usize, StoreError> {
    let ids: Vec<String> = store
        .list(collection)
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect();

    let batch_size = batch_size.max(1);
    let mut deleted = 0;
    for chunk in ids.chunks(batch_size) {
        store.delete_batch(collection, chunk).await?;
        deleted += chunk.len();
        if chunk.len() == batch_size {
            info!("Committed batch of {} deletions", chunk.len());
        } else {
            info!("Committed final batch of {} deletions", chunk.len());
        }
    }

    Ok(deleted)
}
