//! Firestore over its REST API
//!
//! [`connect`] picks the transport from the environment: the local emulator
//! when `FIRESTORE_EMULATOR_HOST` is set, otherwise the production endpoint
//! authenticated with the `GCP_SA_KEY` service account.

mod client;
mod credentials;
mod error;
mod value;

pub use client::{FirestoreClient, Write};
pub use credentials::{ServiceAccountKey, ServiceAccountTokenSource, StaticToken};
pub use error::FirestoreError;

use crate::config::{Environment, GCP_SA_KEY};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const EMULATOR_TOKEN: &str = "owner";

/// Build a client for `project_id` from the environment
pub fn connect(
    env: &Environment,
    project_id: &str,
    timeout: Duration,
) -> Result<FirestoreClient, FirestoreError> {
    if let Some(host) = env.emulator_host() {
        info!(host, project_id, "using Firestore emulator");
        let tokens = Arc::new(StaticToken(EMULATOR_TOKEN.to_string()));
        return FirestoreClient::for_emulator(host, project_id, tokens, timeout);
    }

    let raw = env.get(GCP_SA_KEY).unwrap_or_default();
    let key = ServiceAccountKey::from_json(raw)?;
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    let tokens = Arc::new(ServiceAccountTokenSource::new(key, http));
    info!(project_id, "connected to Firestore");
    FirestoreClient::new(project_id, tokens, timeout)
}
