//! Manual collection operations
//!
//! One named operation per invocation. Operations that target a single
//! document accept an id and otherwise fall back to the first document.

use crate::cli::output::{OutputMode, print_documents};
use crate::store::{Document, DocumentStore, Patch, StoreError, clear_collection};
use serde_json::json;
use std::fmt;
use std::io::Write;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Operation {
    Create,
    Clean,
    Get,
    Update,
    Delete,
    #[value(name = "custom_operation1")]
    CustomOperation1,
    #[value(name = "custom_operation2")]
    CustomOperation2,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Clean => "clean",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::CustomOperation1 => "custom_operation1",
            Operation::CustomOperation2 => "custom_operation2",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("operation '{0}' is not implemented")]
    NotImplemented(Operation),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Sample document written by `create`
fn sample_document() -> Patch {
    Patch::new()
        .set("name", "Example Platform")
        .set("description", "A sample platform entry")
        .server_timestamp("created_at")
        .server_timestamp("updated_at")
        .set("status", "active")
        .set("type", "platform")
        .set(
            "metadata",
            json!({ "version": "1.0", "tags": ["example", "platform"] }),
        )
}

fn update_patch() -> Patch {
    let now = chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string();
    Patch::new()
        .set("name", "Updated Platform")
        .server_timestamp("updated_at")
        .set("status", "updated")
        .set("metadata.version", "1.1")
        .set("metadata.last_updated", now)
}

pub struct CollectionOps<'a> {
    store: &'a dyn DocumentStore,
    collection: String,
    batch_size: usize,
}

impl<'a> CollectionOps<'a> {
    pub fn new(store: &'a dyn DocumentStore, collection: &str, batch_size: usize) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            batch_size,
        }
    }

    pub async fn execute(
        &self,
        op: Operation,
        doc_id: Option<&str>,
        out: &mut dyn Write,
        mode: OutputMode,
    ) -> Result<(), OpsError> {
        info!(
            "Executing {} operation on {} collection...",
            op, self.collection
        );

        match op {
            Operation::Create => {
                self.create(doc_id).await?;
            }
            Operation::Clean => {
                self.clean().await?;
            }
            Operation::Get => self.get(doc_id, out, mode).await?,
            Operation::Update => self.update(doc_id).await?,
            Operation::Delete => self.delete(doc_id).await?,
            Operation::CustomOperation1 | Operation::CustomOperation2 => {
                return Err(OpsError::NotImplemented(op));
            }
        }
        Ok(())
    }

    /// Write the sample document, overwriting `doc_id` when it already exists
    pub async fn create(&self, doc_id: Option<&str>) -> Result<String, OpsError> {
        let sample = sample_document();
        let id = match doc_id {
            Some(id) => {
                self.store.set(&self.collection, id, &sample).await?;
                id.to_string()
            }
            None => self.store.create(&self.collection, None, &sample).await?,
        };
        info!("Document created successfully with ID: {}", id);
        Ok(id)
    }

    pub async fn clean(&self) -> Result<usize, OpsError> {
        let count = clear_collection(self.store, &self.collection, self.batch_size).await?;
        info!(
            "Successfully deleted {} documents from {}",
            count, self.collection
        );
        Ok(count)
    }

    pub async fn get(
        &self,
        doc_id: Option<&str>,
        out: &mut dyn Write,
        mode: OutputMode,
    ) -> Result<(), OpsError> {
        let docs = match doc_id {
            Some(id) => match self.store.get(&self.collection, id).await? {
                Some(doc) => vec![doc],
                None => {
                    warn!("No document found with ID: {}", id);
                    return Ok(());
                }
            },
            None => self.store.list(&self.collection).await?,
        };

        info!("Documents in {}:", self.collection);
        print_documents(out, &docs, mode)?;
        info!("Total documents: {}", docs.len());
        Ok(())
    }

    pub async fn update(&self, doc_id: Option<&str>) -> Result<(), OpsError> {
        let Some(target) = self.resolve_target(doc_id, "update").await? else {
            return Ok(());
        };
        self.store
            .update(&self.collection, &target.id, &update_patch())
            .await?;
        info!("Document {} updated successfully", target.id);
        Ok(())
    }

    pub async fn delete(&self, doc_id: Option<&str>) -> Result<(), OpsError> {
        let Some(target) = self.resolve_target(doc_id, "delete").await? else {
            return Ok(());
        };
        self.store.delete(&self.collection, &target.id).await?;
        info!("Document {} deleted successfully", target.id);
        Ok(())
    }

    /// The named document, or the first one; warns and yields `None` when absent
    async fn resolve_target(
        &self,
        doc_id: Option<&str>,
        verb: &str,
    ) -> Result<Option<Document>, OpsError> {
        let found = match doc_id {
            Some(id) => self.store.get(&self.collection, id).await?,
            None => self.store.first(&self.collection).await?,
        };
        if found.is_none() {
            match doc_id {
                Some(id) => warn!("No document found with ID: {}", id),
                None => warn!("No documents found to {}", verb),
            }
        }
        Ok(found)
    }
}
