//! Configuration types and loading for awesome-platforms

mod env;
mod error;
mod llm;
mod loader;
mod sections;

pub use env::{
    ANTHROPIC_API_KEY, Environment, FIREBASE_PLATFORM_COLLECTION, FIREBASE_PROJECT_ID,
    FIREBASE_VARS, FIRESTORE_EMULATOR_HOST, GCP_SA_KEY,
};
pub use error::ConfigError;
pub use llm::LlmConfig;
pub use loader::{AppConfig, expand_path};
pub use sections::{HealthConfig, ReadmeConfig, StoreBackend, StoreConfig, UpdateConfig};
