//! README, URL health, store, and update settings

use serde::{Deserialize, Serialize};

pub const DEFAULT_COMMIT_MESSAGE: &str = "Auto-update README from Firebase data [skip ci]";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Aims queried by `update-platforms`, in order
pub const DEFAULT_AIMS: &[&str] = &[
    "latest",
    "popular",
    "No-Code & Low-Code Platforms",
    "AI Application Platforms",
    "Web Hosting & Deployment",
    "Content Creation & Publishing",
    "Online Education & Courses",
    "Digital Product Sales",
    "Freelancing & Services",
    "Community Building & Memberships",
    "E-Commerce & Marketplace",
    "Social Media Monetization",
    "Specialized AI Services",
    "Automation & Productivity",
    "Stock Media & Creative Assets",
    "Mobile App Monetization",
    "Affiliate Marketing",
];

/// README rendering and publishing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReadmeConfig {
    /// Output file, relative to the working directory
    #[serde(default = "default_output")]
    pub output: String,

    /// GitHub `owner/name` used in badges and links
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Workflow file name used for the status badge
    #[serde(default = "default_workflow_file")]
    pub workflow_file: String,

    /// IANA timezone for the "last updated" stamp
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Template file overriding the built-in one
    pub template: Option<String>,

    /// Message used when the README is committed
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

fn default_output() -> String {
    "README.md".to_string()
}

fn default_repository() -> String {
    "kevinchwong/awesome-money-platforms".to_string()
}

fn default_workflow_file() -> String {
    "generate-readme-from-firebase.yml".to_string()
}

fn default_timezone() -> String {
    "US/Eastern".to_string()
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

impl Default for ReadmeConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            repository: default_repository(),
            workflow_file: default_workflow_file(),
            timezone: default_timezone(),
            template: None,
            commit_message: default_commit_message(),
        }
    }
}

/// URL health checking
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_health_timeout")]
    pub timeout: u64,

    /// Redirects followed before a URL counts as broken
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// URLs checked at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_health_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_concurrency() -> usize {
    8
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout: default_health_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            concurrency: default_concurrency(),
        }
    }
}

/// Which store holds the platform collection
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Google Cloud Firestore over REST
    #[default]
    Firestore,
    /// Local SQLite database
    Sqlite,
}

/// Platform store settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file for the sqlite backend (`~` is expanded)
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Maximum writes per batch commit
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retries for Firestore requests that fail with 429, 5xx, or a network error
    #[serde(default = "default_store_retries")]
    pub max_retries: u32,
}

fn default_sqlite_path() -> String {
    "~/.config/awesome-platforms/platforms.db".to_string()
}

fn default_batch_size() -> usize {
    500
}

fn default_store_retries() -> u32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            batch_size: default_batch_size(),
            max_retries: default_store_retries(),
        }
    }
}

/// LLM-driven catalog refresh
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConfig {
    /// Aims to query: "latest", "popular", or a category name
    #[serde(default = "default_aims")]
    pub aims: Vec<String>,

    /// Platforms requested per aim
    #[serde(default = "default_update_batch")]
    pub batch_size: u32,
}

fn default_aims() -> Vec<String> {
    DEFAULT_AIMS.iter().map(|s| s.to_string()).collect()
}

fn default_update_batch() -> u32 {
    20
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            aims: default_aims(),
            batch_size: default_update_batch(),
        }
    }
}
