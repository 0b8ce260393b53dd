//! Application configuration and strategy factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sheetgrade_core::model::ScoringConfig;
use sheetgrade_core::traits::ExtractionStrategy;

use crate::ocr::OcrStrategy;
use crate::pattern::{PatternConfig, PatternStrategy};
use crate::visual::{VisualConfig, VisualStrategy};

/// Configuration for a single extraction strategy.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in
/// logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StrategyConfig {
    Pattern {
        #[serde(default)]
        options: Option<usize>,
    },
    Visual {
        #[serde(default)]
        options: Option<usize>,
    },
    Ocr {
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

impl std::fmt::Debug for StrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyConfig::Pattern { options } => f
                .debug_struct("Pattern")
                .field("options", options)
                .finish(),
            StrategyConfig::Visual { options } => {
                f.debug_struct("Visual").field("options", options).finish()
            }
            StrategyConfig::Ocr {
                endpoint,
                api_key: _,
            } => f
                .debug_struct("Ocr")
                .field("endpoint", endpoint)
                .field("api_key", &"***")
                .finish(),
        }
    }
}

/// Top-level sheetgrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetgradeConfig {
    /// Strategy configurations keyed by name.
    #[serde(default)]
    pub strategies: HashMap<String, StrategyConfig>,
    /// Strategies to run per job, in priority order; the first is the
    /// primary one used to read key documents.
    #[serde(default = "default_enabled")]
    pub enabled_strategies: Vec<String>,
    /// Default scoring configuration.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Upload size cap in megabytes.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,
    /// Normalized page height in pixels.
    #[serde(default = "default_page_height")]
    pub page_height: u32,
    /// Directory holding the evaluation history.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_enabled() -> Vec<String> {
    vec!["pattern".to_string(), "visual".to_string()]
}

fn default_max_file_size_mb() -> usize {
    10
}

fn default_page_height() -> u32 {
    1400
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./sheetgrade-history")
}

impl Default for SheetgradeConfig {
    fn default() -> Self {
        Self {
            strategies: HashMap::new(),
            enabled_strategies: default_enabled(),
            scoring: ScoringConfig::default(),
            max_file_size_mb: default_max_file_size_mb(),
            page_height: default_page_height(),
            store_dir: default_store_dir(),
        }
    }
}

impl SheetgradeConfig {
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a strategy config.
fn resolve_strategy_config(config: &StrategyConfig) -> StrategyConfig {
    match config {
        StrategyConfig::Ocr { endpoint, api_key } => StrategyConfig::Ocr {
            endpoint: resolve_env_vars(endpoint),
            api_key: api_key.as_ref().map(|k| resolve_env_vars(k)),
        },
        other => other.clone(),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `sheetgrade.toml` in the current directory
/// 2. `~/.config/sheetgrade/config.toml`
///
/// Environment variable override: `SHEETGRADE_OCR_KEY`.
pub fn load_config() -> Result<SheetgradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SheetgradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("sheetgrade.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<SheetgradeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SheetgradeConfig::default(),
    };

    // Apply env var override for the OCR credential.
    if let Ok(key) = std::env::var("SHEETGRADE_OCR_KEY") {
        if let Some(StrategyConfig::Ocr { api_key, .. }) = config.strategies.get_mut("ocr") {
            *api_key = Some(key);
        }
    }

    // Resolve env vars in all strategy configs.
    let resolved: HashMap<String, StrategyConfig> = config
        .strategies
        .iter()
        .map(|(k, v)| (k.clone(), resolve_strategy_config(v)))
        .collect();
    config.strategies = resolved;

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("sheetgrade"))
}

/// Create a strategy instance by name.
///
/// Local strategies fall back to their defaults when unconfigured; the OCR
/// strategy needs an endpoint and so must be configured explicitly.
pub fn create_strategy(
    name: &str,
    config: Option<&StrategyConfig>,
) -> Result<Box<dyn ExtractionStrategy>> {
    match config {
        Some(StrategyConfig::Pattern { options }) => {
            let mut cfg = PatternConfig::default();
            if let Some(options) = options {
                cfg.options = *options;
            }
            Ok(Box::new(PatternStrategy::new(cfg)))
        }
        Some(StrategyConfig::Visual { options }) => {
            let mut cfg = VisualConfig::default();
            if let Some(options) = options {
                cfg.options = *options;
            }
            Ok(Box::new(VisualStrategy::new(cfg)))
        }
        Some(StrategyConfig::Ocr { endpoint, api_key }) => {
            Ok(Box::new(OcrStrategy::new(endpoint, api_key.clone())))
        }
        None => match name {
            "pattern" => Ok(Box::new(PatternStrategy::default())),
            "visual" => Ok(Box::new(VisualStrategy::default())),
            other => anyhow::bail!(
                "strategy '{other}' is not configured and has no default; \
                 add a [strategies.{other}] section to the config"
            ),
        },
    }
}
