use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_CATALOG_URL;
use crate::error::MirrorError;

pub const DEFAULT_CONFIG_FILE: &str = "catalog-mirror.json";
pub const DEFAULT_THEME: &str = "hospitals";
pub const DEFAULT_OUTPUT_DIR: &str = "cms_hospitals_data";
pub const DEFAULT_LEDGER_FILE: &str = "download_metadata.json";
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub ledger_path: Option<Utf8PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub catalog_url: Option<String>,
    pub theme: Option<String>,
    pub concurrency: Option<usize>,
    pub output_dir: Option<Utf8PathBuf>,
    pub ledger_path: Option<Utf8PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub catalog_url: String,
    pub theme: String,
    pub concurrency: usize,
    pub output_dir: Utf8PathBuf,
    pub ledger_path: Utf8PathBuf,
    pub timeout: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `catalog-mirror.json` in the working directory when
    /// no path is given. Only an explicitly requested file must exist.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, MirrorError> {
        let config_path = Utf8PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        let config = if path.is_none() && !config_path.as_std_path().exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(config_path.as_std_path())
                .map_err(|_| MirrorError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| MirrorError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, MirrorError> {
        let catalog_url = overrides
            .catalog_url
            .or(config.catalog_url)
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());
        if catalog_url.trim().is_empty() {
            return Err(MirrorError::InvalidConfig(
                "catalog_url must not be empty".to_string(),
            ));
        }

        let concurrency = overrides
            .concurrency
            .or(config.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(MirrorError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let timeout_secs = overrides
            .timeout_secs
            .or(config.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(MirrorError::InvalidConfig(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            catalog_url,
            theme: overrides
                .theme
                .or(config.theme)
                .unwrap_or_else(|| DEFAULT_THEME.to_string()),
            concurrency,
            output_dir: overrides
                .output_dir
                .or(config.output_dir)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR)),
            ledger_path: overrides
                .ledger_path
                .or(config.ledger_path)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LEDGER_FILE)),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
