//! Configuration and content-service factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lexiflow_core::model::CefrLevel;
use lexiflow_core::traits::ContentService;

use crate::gemini::GeminiContentService;
use crate::offline::OfflineContentService;

/// Name under which the offline service is always available.
pub const OFFLINE_PROVIDER: &str = "offline";

/// Configuration for a single content service.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        max_output_tokens: Option<u32>,
    },
    Offline {
        #[serde(default)]
        default_topic: Option<String>,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Gemini {
                api_key: _,
                base_url,
                model,
                max_output_tokens,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .field("max_output_tokens", max_output_tokens)
                .finish(),
            ProviderConfig::Offline { default_topic } => f
                .debug_struct("Offline")
                .field("default_topic", default_topic)
                .finish(),
        }
    }
}

/// Top-level lexiflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiflowConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider used when none is named on the command line.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// CEFR level used when none is given.
    #[serde(default)]
    pub default_level: CefrLevel,
    /// Where spaced-repetition data is kept.
    #[serde(default = "default_srs_path")]
    pub srs_path: PathBuf,
    /// Output directory for session reports.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_srs_path() -> PathBuf {
    dirs_path()
        .map(|d| d.join("srs.json"))
        .unwrap_or_else(|| PathBuf::from("lexiflow-srs.json"))
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("./lexiflow-reports")
}

impl Default for LexiflowConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_level: CefrLevel::default(),
            srs_path: default_srs_path(),
            reports_dir: default_reports_dir(),
        }
    }
}

impl LexiflowConfig {
    /// Look up a provider by name. `offline` resolves even when it is not
    /// configured.
    pub fn provider(&self, name: &str) -> Result<ProviderConfig> {
        if let Some(config) = self.providers.get(name) {
            return Ok(config.clone());
        }
        if name == OFFLINE_PROVIDER {
            return Ok(ProviderConfig::Offline {
                default_topic: None,
            });
        }
        let mut known: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        known.push(OFFLINE_PROVIDER);
        known.sort_unstable();
        anyhow::bail!(
            "provider '{name}' is not configured (available: {})",
            known.join(", ")
        )
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let value = std::env::var(&result[start + 2..start + end]).unwrap_or_default();
        result.replace_range(start..start + end + 1, &value);
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::Gemini {
            api_key,
            base_url,
            model,
            max_output_tokens,
        } => ProviderConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            model: model.as_deref().map(resolve_env_vars),
            max_output_tokens: *max_output_tokens,
        },
        ProviderConfig::Offline { default_topic } => ProviderConfig::Offline {
            default_topic: default_topic.as_deref().map(resolve_env_vars),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lexiflow.toml` in the current directory
/// 2. `~/.config/lexiflow/config.toml`
///
/// `LEXIFLOW_GEMINI_KEY` overrides (or creates) the `gemini` provider's key.
pub fn load_config() -> Result<LexiflowConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LexiflowConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("lexiflow.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<LexiflowConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LexiflowConfig::default(),
    };

    if let Ok(key) = std::env::var("LEXIFLOW_GEMINI_KEY") {
        let entry = config
            .providers
            .entry("gemini".into())
            .or_insert(ProviderConfig::Gemini {
                api_key: String::new(),
                base_url: None,
                model: None,
                max_output_tokens: None,
            });
        if let ProviderConfig::Gemini { api_key, .. } = entry {
            *api_key = key;
        }
    }

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lexiflow"))
}

/// Create a content service from its configuration.
pub fn create_service(name: &str, config: &ProviderConfig) -> Result<Box<dyn ContentService>> {
    match config {
        ProviderConfig::Gemini {
            api_key,
            base_url,
            model,
            max_output_tokens,
        } => {
            if api_key.trim().is_empty() {
                anyhow::bail!(
                    "provider '{name}' has no API key; set LEXIFLOW_GEMINI_KEY or api_key in lexiflow.toml"
                );
            }
            let mut service = GeminiContentService::new(api_key, base_url.clone(), model.clone())?;
            if let Some(tokens) = max_output_tokens {
                service = service.with_max_output_tokens(*tokens);
            }
            tracing::info!(provider = name, model = service.model(), "content service ready");
            Ok(Box::new(service))
        }
        ProviderConfig::Offline { default_topic } => {
            Ok(Box::new(OfflineContentService::new(default_topic.clone())))
        }
    }
}

/// Starter configuration written by `lexiflow init`.
pub fn starter_config() -> &'static str {
    r#"# lexiflow configuration
default_provider = "gemini"
default_level = "B1"
reports_dir = "./lexiflow-reports"

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"
# model = "gemini-2.5-flash"
# max_output_tokens = 8192

[providers.offline]
type = "offline"
default_topic = "Everyday Life"
"#
}
