//! Local SQLite document store
//!
//! Documents are kept as JSON text, one row per `(collection, id)`. Server
//! timestamps resolve to the local clock at write time.

use super::schema::init_schema;
use super::types::{Document, DocumentStore, Fields, Patch, StoreError, auto_id};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn row_to_document(id: String, data: String) -> Result<Document, StoreError> {
    let fields: Fields = serde_json::from_str(&data)?;
    Ok(Document::new(id, fields))
}

fn load(conn: &Connection, collection: &str, id: &str) -> Result<Option<Fields>, StoreError> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    data.map(|d| serde_json::from_str(&d).map_err(StoreError::from))
        .transpose()
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, data FROM documents WHERE collection = ?1 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([collection], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<(String, String)>, _>>()?;
            rows.into_iter()
                .map(|(id, data)| row_to_document(id, data))
                .collect()
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.with_conn(|conn| {
            Ok(load(conn, collection, id)?.map(|fields| Document::new(id, fields)))
        })
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        patch: &Patch,
    ) -> Result<String, StoreError> {
        let id = id.map(str::to_string).unwrap_or_else(auto_id);
        let ts = now();
        let mut fields = Fields::new();
        patch.apply(&mut fields, &ts);
        let data = serde_json::to_string(&fields)?;

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(collection, id) DO NOTHING",
                params![collection, id, data, ts],
            )?;
            if inserted == 0 {
                return Err(StoreError::already_exists(collection, &id));
            }
            Ok(())
        })?;

        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, patch: &Patch) -> Result<(), StoreError> {
        let ts = now();
        let mut fields = Fields::new();
        patch.apply(&mut fields, &ts);
        let data = serde_json::to_string(&fields)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(collection, id) DO UPDATE
                 SET data = excluded.data, updated_at = excluded.updated_at",
                params![collection, id, data, ts],
            )?;
            Ok(())
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: &Patch) -> Result<(), StoreError> {
        let ts = now();
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut fields =
                load(&tx, collection, id)?.ok_or_else(|| StoreError::not_found(collection, id))?;
            patch.apply(&mut fields, &ts);
            tx.execute(
                "UPDATE documents SET data = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                params![collection, id, serde_json::to_string(&fields)?, ts],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            Ok(())
        })
    }

    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut matches: Vec<Document> = self
            .list(collection)
            .await?
            .into_iter()
            .filter(|doc| lookup_path(&doc.fields, field) == Some(value))
            .collect();
        if let Some(limit) = limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    async fn first(&self, collection: &str) -> Result<Option<Document>, StoreError> {
        self.with_conn(|conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT id, data FROM documents WHERE collection = ?1
                     ORDER BY created_at, id LIMIT 1",
                    [collection],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(id, data)| row_to_document(id, data)).transpose()
        })
    }

    async fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("DELETE FROM documents WHERE collection = ?1 AND id = ?2")?;
                for id in ids {
                    stmt.execute(params![collection, id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }
}

/// Follow a dotted path into nested maps
fn lookup_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
