use render_engine::config::RendererConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "RENDERER_CONFIG";

/// Configuration file used when `RENDERER_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config/renderer.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Compact JSON responses before sending them.
    pub minify: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            minify: true,
        }
    }
}

/// Template file names, relative to `template_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateFiles {
    pub response: String,
    pub error: String,
    pub timestamp: String,
    pub climate: String,
    pub billing: String,
    pub weather_current: String,
    pub weather_forecast: String,
}

impl Default for TemplateFiles {
    fn default() -> Self {
        Self {
            response: "response.json".to_string(),
            error: "error.json".to_string(),
            timestamp: "timestamp.json".to_string(),
            climate: "indoor_climate.json".to_string(),
            billing: "billing_report.json".to_string(),
            weather_current: "weather_current.json".to_string(),
            weather_forecast: "weather_forecast.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub renderer: RendererConfig,
    pub server: ServerConfig,
    pub template_dir: PathBuf,
    pub templates: TemplateFiles,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// JSON array of events used to prime the in-memory event source.
    pub seed_events: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            renderer: RendererConfig::default(),
            server: ServerConfig::default(),
            template_dir: PathBuf::from("templates"),
            templates: TemplateFiles::default(),
            log_level: "info".to_string(),
            seed_events: None,
        }
    }
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Load from `RENDERER_CONFIG` or the default path.
    ///
    /// A missing file yields the defaults; the flag reports whether a file
    /// was read. Unreadable or invalid files are errors.
    pub fn load_or_default() -> Result<(Self, bool), ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if !Path::new(&path).exists() {
            return Ok((Self::default(), false));
        }
        Self::load(&path).map(|config| (config, true))
    }

    pub fn template_path(&self, file: &str) -> PathBuf {
        self.template_dir.join(file)
    }
}
