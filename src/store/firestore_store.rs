//! Document store backed by Firestore

use super::types::{Document, DocumentStore, Patch, StoreError};
use crate::firestore::{FirestoreClient, FirestoreError, Write};
use async_trait::async_trait;
use serde_json::Value;

pub struct FirestoreStore {
    client: FirestoreClient,
}

impl FirestoreStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.client.list_documents(collection).await?)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.client.get_document(collection, id).await?)
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        patch: &Patch,
    ) -> Result<String, StoreError> {
        match self.client.create_document(collection, id, patch).await {
            Ok(id) => Ok(id),
            Err(FirestoreError::AlreadyExists { .. }) => Err(StoreError::already_exists(
                collection,
                id.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, collection: &str, id: &str, patch: &Patch) -> Result<(), StoreError> {
        Ok(self.client.set_document(collection, id, patch).await?)
    }

    async fn update(&self, collection: &str, id: &str, patch: &Patch) -> Result<(), StoreError> {
        match self.client.patch_document(collection, id, patch).await {
            Ok(()) => Ok(()),
            Err(FirestoreError::NotFound { .. } | FirestoreError::FailedPrecondition { .. }) => {
                Err(StoreError::not_found(collection, id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        Ok(self.client.delete_document(collection, id).await?)
    }

    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .client
            .query_equal(collection, Some((field, value)), limit)
            .await?)
    }

    async fn first(&self, collection: &str) -> Result<Option<Document>, StoreError> {
        let mut docs = self.client.query_equal(collection, None, Some(1)).await?;
        Ok(docs.pop())
    }

    async fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        let writes: Vec<Write> = ids
            .iter()
            .map(|id| Write::Delete { id: id.clone() })
            .collect();
        Ok(self.client.commit(collection, &writes).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::StaticToken;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

    fn store(server: &MockServer) -> FirestoreStore {
        let client = FirestoreClient::with_root(
            &server.url("/v1"),
            "demo",
            Arc::new(StaticToken("owner".into())),
            Duration::from_secs(5),
        )
        .unwrap();
        FirestoreStore::new(client)
    }

    #[tokio::test]
    async fn test_update_missing_maps_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{}:commit", DOCS));
                then.status(400).json_body(json!({
                    "error": {"code": 400, "message": "no entity to update", "status": "FAILED_PRECONDITION"}
                }));
            })
            .await;

        let err = store(&server)
            .update("platforms", "gone", &Patch::new().set("status", "updated"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref id, .. } if id == "gone"));
    }

    #[tokio::test]
    async fn test_first_uses_limit_one_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("{}:runQuery", DOCS))
                    .json_body(json!({
                        "structuredQuery": {"from": [{"collectionId": "platforms"}], "limit": 1}
                    }));
                then.status(200).json_body(json!([{
                    "document": {
                        "name": "projects/demo/databases/(default)/documents/platforms/x1",
                        "fields": {"name": {"stringValue": "Etsy"}}
                    }
                }]));
            })
            .await;

        let doc = store(&server).first("platforms").await.unwrap().unwrap();
        mock.assert_async().await;
        assert_eq!(doc.id, "x1");
    }

    #[tokio::test]
    async fn test_delete_batch_is_one_commit() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("{}:commit", DOCS))
                    .body_contains("platforms/a")
                    .body_contains("platforms/b");
                then.status(200).json_body(json!({"writeResults": [{}, {}]}));
            })
            .await;

        store(&server)
            .delete_batch("platforms", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        mock.assert_hits_async(1).await;
    }
}
