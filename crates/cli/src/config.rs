use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kassensturz_core::CategoryMapper;
use kassensturz_export::{DEFAULT_BASE_URL, DEFAULT_PAUSE};
use kassensturz_import::TableLayout;

pub const DEFAULT_CONFIG_FILE: &str = "kassensturz.toml";

/// Scalar settings and custom layouts. `[mappings]` is read separately by
/// [`CategoryMapper::from_toml`].
#[derive(Debug, Default, Deserialize)]
struct Settings {
    base_url: Option<String>,
    pause_seconds: Option<u64>,
    account: Option<String>,
    #[serde(default)]
    layouts: Vec<TableLayout>,
}

#[derive(Debug)]
pub struct Config {
    pub base_url: String,
    pub pause: Duration,
    pub account: Option<String>,
    pub layouts: Vec<TableLayout>,
    /// Suggested mappings overlaid with the configured ones.
    pub mapper: CategoryMapper,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            pause: DEFAULT_PAUSE,
            account: None,
            layouts: Vec::new(),
            mapper: CategoryMapper::suggested(),
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text).context("Invalid configuration")?;
        let configured = CategoryMapper::from_toml(text).context("Invalid [mappings] table")?;
        let mut mapper = CategoryMapper::suggested();
        mapper.extend(configured);

        let defaults = Config::default();
        Ok(Config {
            base_url: settings.base_url.unwrap_or(defaults.base_url),
            pause: settings.pause_seconds.map(Duration::from_secs).unwrap_or(defaults.pause),
            account: settings.account,
            layouts: settings.layouts,
            mapper,
        })
    }

    /// Reads `path`, or `kassensturz.toml` in the working directory when it
    /// exists. Built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    tracing::debug!("No configuration file, using defaults");
                    return Ok(Config::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("In {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            mappings = config.mapper.len(),
            layouts = config.layouts.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Configured layouts first so they can shadow built-ins.
    pub fn all_layouts(&self) -> Vec<TableLayout> {
        let mut layouts = self.layouts.clone();
        layouts.extend(TableLayout::builtin());
        layouts
    }

    pub fn layout_named(&self, name: &str) -> Option<TableLayout> {
        self.all_layouts()
            .into_iter()
            .find(|l| l.institution.eq_ignore_ascii_case(name))
    }
}
