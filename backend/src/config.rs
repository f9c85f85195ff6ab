use serde::{Deserialize, Serialize};
use shared::SourceKind;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub version: f32,
    pub search: SearchConfig,
    pub fallback: FallbackConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// How many of the highest-confidence predictions seed the queries.
    pub top_k: usize,
    pub default_num_products: usize,
    pub default_sources: Vec<SourceKind>,
    pub request_timeout_secs: u64,
    pub localized_queries: bool,
    pub generic_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    pub sample_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_hours: i64,
    pub directory: Option<PathBuf>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            search: SearchConfig::default(),
            fallback: FallbackConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            default_num_products: 6,
            default_sources: vec![SourceKind::Shopee, SourceKind::Lazada],
            request_timeout_secs: 10,
            localized_queries: true,
            generic_keywords: Vec::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 24,
            directory: None,
        }
    }
}

impl RecommendationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    /// Falls back to the built-in defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::warn!(
                "Config file {} not found, using default recommendation settings",
                path.display()
            );
            return Ok(Self::default());
        }
        log::info!("Loading recommendation config from {}", path.display());
        Self::load(path)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: RecommendationConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search.top_k == 0 {
            return Err(ConfigError::Invalid("search.top_k must be at least 1".into()));
        }
        if self.search.default_num_products == 0 {
            return Err(ConfigError::Invalid(
                "search.default_num_products must be at least 1".into(),
            ));
        }
        if self.search.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "search.request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.search.default_sources.is_empty() {
            return Err(ConfigError::Invalid(
                "search.default_sources must name at least one source".into(),
            ));
        }
        if self.cache.ttl_hours <= 0 {
            return Err(ConfigError::Invalid("cache.ttl_hours must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.search.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache.ttl_hours)
    }
}

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: String,
    pub recommendation_config: PathBuf,
    pub classification_results_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
        let recommendation_config = env::var("RECOMMENDATION_CONFIG")
            .unwrap_or_else(|_| "config/recommendation.yaml".to_string());
        let classification_results_dir = env::var("CLASSIFICATION_RESULTS_DIR")
            .unwrap_or_else(|_| "classification_results".to_string());

        Self {
            port,
            recommendation_config: PathBuf::from(recommendation_config),
            classification_results_dir: PathBuf::from(classification_results_dir),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
