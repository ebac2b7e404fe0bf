//! Documents, patches, and the store trait

use crate::firestore::FirestoreError;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field map of one document
pub type Fields = Map<String, Value>;

const AUTO_ID_LEN: usize = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Firestore(#[from] FirestoreError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid document data: {0}")]
    Data(#[from] serde_json::Error),

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("failed to create {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store connection lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(collection: &str, id: &str) -> Self {
        Self::AlreadyExists {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Field writes plus server-timestamp transforms
///
/// Paths may be dotted (`metadata.version`) to touch a nested key without
/// replacing the rest of the map.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    sets: Vec<(String, Value)>,
    server_timestamps: Vec<String>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every top-level field of `fields`
    pub fn from_fields(fields: Fields) -> Self {
        Self {
            sets: fields.into_iter().collect(),
            server_timestamps: Vec::new(),
        }
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((path.into(), value.into()));
        self
    }

    /// Resolve `path` to the write time on the server
    pub fn server_timestamp(mut self, path: impl Into<String>) -> Self {
        self.server_timestamps.push(path.into());
        self
    }

    pub fn server_timestamps(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Paths written by value (the update mask)
    pub fn field_paths(&self) -> Vec<String> {
        self.sets.iter().map(|(path, _)| path.clone()).collect()
    }

    /// The value writes, nested by path
    pub fn nested_fields(&self) -> Fields {
        let mut fields = Fields::new();
        for (path, value) in &self.sets {
            set_path(&mut fields, path, value.clone());
        }
        fields
    }

    /// Apply the patch to `target`, using `now` for server timestamps
    pub fn apply(&self, target: &mut Fields, now: &str) {
        for (path, value) in &self.sets {
            set_path(target, path, value.clone());
        }
        for path in &self.server_timestamps {
            set_path(target, path, Value::String(now.to_string()));
        }
    }
}

/// Write `value` at a dotted path, creating intermediate maps
fn set_path(target: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Fields::new()));
            if !entry.is_object() {
                *entry = Value::Object(Fields::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Client-side document id, same alphabet and length as the Firestore SDKs
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// A collection-addressed document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Every document in the collection
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create a document, failing if the id is taken; returns the id
    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        patch: &Patch,
    ) -> Result<String, StoreError>;

    /// Write the document at `id`, replacing it whole if it exists
    async fn set(&self, collection: &str, id: &str, patch: &Patch) -> Result<(), StoreError>;

    /// Merge a patch into an existing document
    async fn update(&self, collection: &str, id: &str, patch: &Patch) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Documents whose `field` equals `value`
    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Any one document of the collection
    async fn first(&self, collection: &str) -> Result<Option<Document>, StoreError>;

    /// Delete `ids` in one atomic batch
    async fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_nested_fields_and_paths() {
        let patch = Patch::new()
            .set("name", "Updated Platform")
            .set("metadata.version", "1.1")
            .server_timestamp("updated_at");

        assert_eq!(patch.field_paths(), vec!["name", "metadata.version"]);
        assert_eq!(patch.server_timestamps(), &["updated_at".to_string()]);
        assert_eq!(
            Value::Object(patch.nested_fields()),
            json!({"name": "Updated Platform", "metadata": {"version": "1.1"}})
        );
    }

    #[test]
    fn test_apply_keeps_sibling_keys() {
        let mut fields = json!({
            "name": "Example Platform",
            "metadata": {"version": "1.0", "tags": ["example"]}
        })
        .as_object()
        .cloned()
        .unwrap();

        Patch::new()
            .set("metadata.version", "1.1")
            .server_timestamp("updated_at")
            .apply(&mut fields, "2024-10-01T00:00:00Z");

        assert_eq!(fields["metadata"]["version"], "1.1");
        assert_eq!(fields["metadata"]["tags"], json!(["example"]));
        assert_eq!(fields["updated_at"], "2024-10-01T00:00:00Z");
        assert_eq!(fields["name"], "Example Platform");
    }

    #[test]
    fn test_apply_replaces_scalar_on_nested_path() {
        let mut fields = json!({"metadata": "legacy"}).as_object().cloned().unwrap();
        Patch::new().set("metadata.version", "2").apply(&mut fields, "now");
        assert_eq!(fields["metadata"], json!({"version": "2"}));
    }

    #[test]
    fn test_auto_id_shape() {
        let id = auto_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, auto_id());
    }

    #[test]
    fn test_document_get_str() {
        let doc = Document::new("a", json!({"name": "Etsy", "n": 1}).as_object().cloned().unwrap());
        assert_eq!(doc.get_str("name"), Some("Etsy"));
        assert_eq!(doc.get_str("n"), None);
        assert_eq!(doc.get_str("missing"), None);
    }
}
