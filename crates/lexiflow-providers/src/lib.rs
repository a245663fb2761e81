//! lexiflow-providers — Content service backends.
//!
//! Implements the `ContentService` trait for the Gemini generative language
//! API and for a deterministic offline backend, plus the configuration layer
//! that selects between them.

pub mod config;
pub mod error;
pub mod gemini;
pub mod offline;
mod prompts;

pub use config::{
    create_service, load_config, load_config_from, starter_config, LexiflowConfig, ProviderConfig,
    OFFLINE_PROVIDER,
};
pub use error::ProviderError;
pub use gemini::GeminiContentService;
pub use offline::OfflineContentService;
