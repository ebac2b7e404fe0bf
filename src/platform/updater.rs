//! LLM-driven refresh of the platform collection
//!
//! Each aim is one prompt. Results are upserted by `name_lower`, so a
//! platform the model returns twice is updated rather than duplicated.

use super::model::{clean_domain, name_key};
use super::prompts::{Aim, build_prompt};
use crate::cli::signals::CancellationToken;
use crate::llm::{LlmClient, LlmRequest, extract_json};
use crate::store::{DocumentStore, Fields, Patch, StoreError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const NAME_KEY_FIELD: &str = "name_lower";

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("platform result has no name")]
    MissingName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one platform result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
    /// Dry run: nothing written
    Skipped,
}

/// Settings for one update run
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub aims: Vec<String>,
    pub batch_size: u32,
    pub dry_run: bool,
    pub system_prompt: String,
    /// Overrides today's date in prompts
    pub as_of: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub aims_completed: Vec<String>,
    pub aims_failed: Vec<String>,
    pub cancelled: bool,
}

impl UpdateSummary {
    /// True when aims ran and none produced data
    pub fn all_aims_failed(&self) -> bool {
        self.aims_completed.is_empty() && !self.aims_failed.is_empty()
    }
}

pub struct PlatformUpdater<'a> {
    llm: &'a dyn LlmClient,
    store: &'a dyn DocumentStore,
    collection: String,
}

impl<'a> PlatformUpdater<'a> {
    pub fn new(llm: &'a dyn LlmClient, store: &'a dyn DocumentStore, collection: &str) -> Self {
        Self {
            llm,
            store,
            collection: collection.to_string(),
        }
    }

    /// Ask the model for `aim` and return the result records
    ///
    /// Model and parse failures are logged and yield no records.
    pub async fn fetch(&self, aim: &Aim, as_of: &str, options: &UpdateOptions) -> Vec<Fields> {
        let prompt = build_prompt(aim, as_of, options.batch_size, &mut rand::rng());
        let request = LlmRequest::new(prompt).with_system_prompt(options.system_prompt.clone());

        let response = match self.llm.complete(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error retrieving platform data: {}", e);
                return Vec::new();
            }
        };
        debug!("Raw response content: {}", response.text);
        if response.is_truncated() {
            warn!("Response from {} hit max_tokens and may be cut off", self.llm.name());
        }

        if response.text.trim().is_empty() {
            error!("Received empty response from {}.", self.llm.name());
            return Vec::new();
        }

        let Some(value) = extract_json(&response.text) else {
            error!("JSON decoding error: no JSON value in response");
            return Vec::new();
        };

        let results = match value {
            Value::Object(mut obj) => match obj.remove("results") {
                Some(Value::Array(items)) => items,
                _ => {
                    error!("JSON decoding error: response has no \"results\" array");
                    return Vec::new();
                }
            },
            Value::Array(items) => items,
            _ => {
                error!("JSON decoding error: unexpected response shape");
                return Vec::new();
            }
        };

        info!("Successfully retrieved platform data from {}.", self.llm.name());
        results
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(fields),
                _ => None,
            })
            .collect()
    }

    /// Add `fields` as a new platform or update the one with the same name key
    pub async fn upsert(&self, mut fields: Fields, dry_run: bool) -> Result<Upsert, UpdateError> {
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .ok_or(UpdateError::MissingName)?;
        let key = Value::String(name_key(name));

        if !fields.contains_key("cleaned_domain") {
            if let Some(url) = fields.get("url").and_then(Value::as_str) {
                let domain = clean_domain(url);
                fields.insert("cleaned_domain".into(), Value::String(domain));
            }
        }

        if dry_run {
            return Ok(Upsert::Skipped);
        }

        let existing = self
            .store
            .find_equal(&self.collection, NAME_KEY_FIELD, &key, Some(1))
            .await?;

        match existing.first() {
            None => {
                fields.insert(NAME_KEY_FIELD.into(), key);
                self.store
                    .create(&self.collection, None, &Patch::from_fields(fields))
                    .await?;
                Ok(Upsert::Added)
            }
            Some(doc) => {
                self.store
                    .update(&self.collection, &doc.id, &Patch::from_fields(fields))
                    .await?;
                Ok(Upsert::Updated)
            }
        }
    }

    /// Run every aim in order, stopping early when `cancel` fires
    pub async fn run(&self, options: &UpdateOptions, cancel: &CancellationToken) -> UpdateSummary {
        let as_of = options
            .as_of
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
        let mut summary = UpdateSummary::default();

        for raw in &options.aims {
            if cancel.is_cancelled() {
                warn!("Update cancelled before aim '{}'", raw);
                summary.cancelled = true;
                break;
            }

            let aim = Aim::parse(raw);
            let results = self.fetch(&aim, &as_of, options).await;
            if results.is_empty() {
                error!("No {} platform data to update.", aim.label());
                summary.aims_failed.push(raw.clone());
                continue;
            }

            for fields in results {
                let name = fields
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("<unnamed>")
                    .to_string();
                match self.upsert(fields, options.dry_run).await {
                    Ok(Upsert::Added) => {
                        info!("Added platform: {} {}", aim.label(), name);
                        summary.added += 1;
                    }
                    Ok(Upsert::Updated) => {
                        info!("Platform already exists, updated: {} {}", aim.label(), name);
                        summary.updated += 1;
                    }
                    Ok(Upsert::Skipped) => {
                        info!("Dry run, would upsert platform: {} {}", aim.label(), name);
                        summary.skipped += 1;
                    }
                    Err(e) => {
                        error!("Error updating platform {} {}: {}", aim.label(), name, e);
                        summary.failed += 1;
                    }
                }
            }
            summary.aims_completed.push(raw.clone());
        }

        info!(
            added = summary.added,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            aims_failed = summary.aims_failed.len(),
            "platform update finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned responses and records prompts
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()));
            reply.map(|text| LlmResponse::new(text, Duration::from_millis(1)))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn options(aims: &[&str]) -> UpdateOptions {
        UpdateOptions {
            aims: aims.iter().map(|a| a.to_string()).collect(),
            batch_size: 20,
            dry_run: false,
            system_prompt: "system".into(),
            as_of: Some("2024-10-01".into()),
        }
    }

    fn reply(platforms: Value) -> Result<String, LlmError> {
        Ok(json!({ "results": platforms }).to_string())
    }

    #[tokio::test]
    async fn test_adds_then_updates_by_name_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![
            reply(json!([{"name": "Gum Road", "url": "https://www.gumroad.com/", "importance": 4}])),
            reply(json!([{"name": "gumroad", "importance": 5}])),
        ]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let summary = updater
            .run(&options(&["latest", "Digital Product Sales"]), &CancellationToken::new())
            .await;

        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.aims_completed.len(), 2);

        let docs = store.list("platforms").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields["name_lower"], "gumroad");
        assert_eq!(docs[0].fields["importance"], 5);
        assert_eq!(docs[0].fields["cleaned_domain"], "gumroad.com");
        assert_eq!(docs[0].fields["name"], "gumroad");

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[1].contains(r#"in category "Digital Product Sales""#));
    }

    #[tokio::test]
    async fn test_failed_aim_is_skipped_not_fatal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![
            Ok("I cannot help with that".into()),
            Err(LlmError::auth("bad key")),
            reply(json!([{"name": "Etsy"}])),
        ]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let summary = updater
            .run(&options(&["latest", "popular", "Affiliate Marketing"]), &CancellationToken::new())
            .await;

        assert_eq!(summary.aims_failed, vec!["latest", "popular"]);
        assert_eq!(summary.aims_completed, vec!["Affiliate Marketing"]);
        assert!(!summary.all_aims_failed());
        assert_eq!(store.list("platforms").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_every_aim_failing_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![Ok("   ".into())]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let summary = updater
            .run(&options(&["latest"]), &CancellationToken::new())
            .await;
        assert!(summary.all_aims_failed());
    }

    #[tokio::test]
    async fn test_nameless_result_is_counted_as_failure() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![reply(json!([
            {"description": "no name"},
            {"name": "Ko-fi"}
        ]))]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let summary = updater
            .run(&options(&["popular"]), &CancellationToken::new())
            .await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.added, 1);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![reply(json!([{"name": "Etsy"}, {"name": "Fiverr"}]))]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let mut opts = options(&["popular"]);
        opts.dry_run = true;
        let summary = updater.run(&opts, &CancellationToken::new()).await;

        assert_eq!(summary.skipped, 2);
        assert!(store.list("platforms").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_aim() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![reply(json!([{"name": "Etsy"}]))]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = updater.run(&options(&["latest", "popular"]), &cancel).await;

        assert!(summary.cancelled);
        assert!(summary.aims_completed.is_empty());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fenced_response_is_accepted() {
        let store = SqliteStore::open_in_memory().unwrap();
        let llm = ScriptedClient::new(vec![Ok(
            "Here you go:\n```json\n{\"results\": [{\"name\": \"Patreon\"}]}\n```".into(),
        )]);
        let updater = PlatformUpdater::new(&llm, &store, "platforms");

        let results = updater
            .fetch(&Aim::Popular, "2024-10-01", &options(&["popular"]))
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["name"], "Patreon");
    }
}
