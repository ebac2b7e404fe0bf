//! Firestore REST client
//!
//! Talks to the `v1` REST surface directly. Every write goes through
//! `documents:commit` so creates, merges, deletes, and server timestamps
//! share one code path and batch deletes stay atomic.

use super::credentials::TokenSource;
use super::error::FirestoreError;
use super::value::{decode_fields, encode, encode_fields, quote_field_path};
use crate::llm::RetryPolicy;
use crate::store::{Document, Fields, Patch, auto_id};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const PRODUCTION_ROOT: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

/// Precondition attached to a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    /// The document must not exist yet
    Missing,
    /// The document must already exist
    Exists,
}

/// One entry of a commit request
#[derive(Debug, Clone)]
pub enum Write {
    /// Write `fields`, restricted to `mask` when given, then apply transforms
    Update {
        id: String,
        fields: Fields,
        mask: Option<Vec<String>>,
        server_timestamps: Vec<String>,
        precondition: Precondition,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    document: Option<RawDocument>,
}

/// Client bound to one project's default database
pub struct FirestoreClient {
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    /// `{root}/projects/{project}/databases/(default)/documents`
    documents_url: String,
    /// `projects/{project}/databases/(default)/documents`
    documents_path: String,
    retry: RetryPolicy,
}

impl FirestoreClient {
    /// Client for the production endpoint
    pub fn new(
        project_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, FirestoreError> {
        Self::with_root(PRODUCTION_ROOT, project_id, tokens, timeout)
    }

    /// Client for the emulator at `host:port`
    pub fn for_emulator(
        host: &str,
        project_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, FirestoreError> {
        Self::with_root(&format!("http://{}/v1", host), project_id, tokens, timeout)
    }

    /// Client for an arbitrary API root (ends in `/v1`)
    pub fn with_root(
        root: &str,
        project_id: &str,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, FirestoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let documents_path = format!("projects/{}/databases/(default)/documents", project_id);
        Ok(Self {
            http,
            tokens,
            documents_url: format!("{}/{}", root.trim_end_matches('/'), documents_path),
            documents_path,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the backoff used for 429, 5xx, and network failures
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_path, collection, id)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        target: &str,
    ) -> Result<reqwest::Response, FirestoreError> {
        let mut attempt = 0;

        loop {
            let replay = request
                .try_clone()
                .ok_or_else(|| FirestoreError::decode("request body cannot be replayed"))?;

            match self.send_once(replay, target).await {
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "Firestore request for {} failed (attempt {}/{}), retrying in {:?}: {}",
                        target,
                        attempt + 1,
                        self.retry.max_retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once(
        &self,
        request: reqwest::RequestBuilder,
        target: &str,
    ) -> Result<reqwest::Response, FirestoreError> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(FirestoreError::from_status(status.as_u16(), &body, target))
    }

    /// Every document in a collection, following page tokens
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, FirestoreError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListResponse = self
                .send(request, collection)
                .await?
                .json()
                .await
                .map_err(|e| FirestoreError::decode(format!("list response: {}", e)))?;

            for raw in page.documents {
                documents.push(into_document(raw)?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(collection, count = documents.len(), "listed documents");
        Ok(documents)
    }

    /// One document, or `None` when it does not exist
    pub async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, FirestoreError> {
        let url = format!("{}/{}/{}", self.documents_url, collection, id);
        let name = self.document_name(collection, id);

        match self.send(self.http.get(&url), &name).await {
            Ok(response) => {
                let raw: RawDocument = response
                    .json()
                    .await
                    .map_err(|e| FirestoreError::decode(format!("get response: {}", e)))?;
                Ok(Some(into_document(raw)?))
            }
            Err(FirestoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Structured query with an optional single `EQUAL` filter
    pub async fn query_equal(
        &self,
        collection: &str,
        filter: Option<(&str, &Value)>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, FirestoreError> {
        let mut query = json!({ "from": [{ "collectionId": collection }] });
        if let Some((field, value)) = filter {
            query["where"] = json!({
                "fieldFilter": {
                    "field": { "fieldPath": quote_field_path(field) },
                    "op": "EQUAL",
                    "value": encode(value),
                }
            });
        }
        if let Some(limit) = limit {
            query["limit"] = json!(limit);
        }

        let url = format!("{}:runQuery", self.documents_url);
        let results: Vec<QueryResult> = self
            .send(
                self.http.post(&url).json(&json!({ "structuredQuery": query })),
                collection,
            )
            .await?
            .json()
            .await
            .map_err(|e| FirestoreError::decode(format!("query response: {}", e)))?;

        results
            .into_iter()
            .filter_map(|r| r.document)
            .map(into_document)
            .collect()
    }

    /// Create a document that must not exist yet; returns its id
    pub async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        patch: &Patch,
    ) -> Result<String, FirestoreError> {
        let id = id.map(str::to_string).unwrap_or_else(auto_id);
        let write = Write::Update {
            id: id.clone(),
            fields: patch.nested_fields(),
            mask: None,
            server_timestamps: patch.server_timestamps().to_vec(),
            precondition: Precondition::Missing,
        };
        self.commit(collection, std::slice::from_ref(&write)).await?;
        Ok(id)
    }

    /// Create or overwrite the document at `id`
    pub async fn set_document(
        &self,
        collection: &str,
        id: &str,
        patch: &Patch,
    ) -> Result<(), FirestoreError> {
        let write = Write::Update {
            id: id.to_string(),
            fields: patch.nested_fields(),
            mask: None,
            server_timestamps: patch.server_timestamps().to_vec(),
            precondition: Precondition::None,
        };
        self.commit(collection, std::slice::from_ref(&write)).await
    }

    /// Merge `patch` into an existing document
    pub async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        patch: &Patch,
    ) -> Result<(), FirestoreError> {
        let write = Write::Update {
            id: id.to_string(),
            fields: patch.nested_fields(),
            mask: Some(patch.field_paths()),
            server_timestamps: patch.server_timestamps().to_vec(),
            precondition: Precondition::Exists,
        };
        self.commit(collection, std::slice::from_ref(&write)).await
    }

    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<(), FirestoreError> {
        let write = Write::Delete { id: id.to_string() };
        self.commit(collection, std::slice::from_ref(&write)).await
    }

    /// Apply writes atomically
    pub async fn commit(&self, collection: &str, writes: &[Write]) -> Result<(), FirestoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let body = json!({
            "writes": writes
                .iter()
                .map(|w| self.write_json(collection, w))
                .collect::<Vec<_>>()
        });

        let url = format!("{}:commit", self.documents_url);
        let target = match writes {
            [single] => self.document_name(collection, write_id(single)),
            _ => collection.to_string(),
        };
        self.send(self.http.post(&url).json(&body), &target).await?;

        debug!(collection, writes = writes.len(), "committed writes");
        Ok(())
    }

    fn write_json(&self, collection: &str, write: &Write) -> Value {
        match write {
            Write::Delete { id } => json!({ "delete": self.document_name(collection, id) }),
            Write::Update {
                id,
                fields,
                mask,
                server_timestamps,
                precondition,
            } => {
                let mut entry = json!({
                    "update": {
                        "name": self.document_name(collection, id),
                        "fields": encode_fields(fields),
                    }
                });
                if let Some(paths) = mask {
                    entry["updateMask"] = json!({
                        "fieldPaths": paths.iter().map(|p| quote_field_path(p)).collect::<Vec<_>>()
                    });
                }
                if !server_timestamps.is_empty() {
                    entry["updateTransforms"] = server_timestamps
                        .iter()
                        .map(|p| {
                            json!({
                                "fieldPath": quote_field_path(p),
                                "setToServerValue": "REQUEST_TIME",
                            })
                        })
                        .collect();
                }
                match precondition {
                    Precondition::None => {}
                    Precondition::Missing => {
                        entry["currentDocument"] = json!({ "exists": false });
                    }
                    Precondition::Exists => {
                        entry["currentDocument"] = json!({ "exists": true });
                    }
                }
                entry
            }
        }
    }
}

fn write_id(write: &Write) -> &str {
    match write {
        Write::Update { id, .. } | Write::Delete { id } => id,
    }
}

fn into_document(raw: RawDocument) -> Result<Document, FirestoreError> {
    let id = raw
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    Ok(Document::new(id, decode_fields(&raw.fields)?))
}
