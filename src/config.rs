/// Application configuration
///
/// Loaded once at startup from `<config_dir>/gusi/config.toml`. Every
/// field has a default, so a missing file or a partial file is fine.
///
/// - Linux: ~/.config/gusi/config.toml
/// - macOS: ~/Library/Application Support/gusi/config.toml
/// - Windows: %APPDATA%\gusi\config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::state::data::ComparisonRow;

/// Environment variable overriding `geocoding.api_key`
pub const GEOCODING_KEY_ENV: &str = "GUSI_GEOCODING_API_KEY";
/// Environment variable overriding `earth_engine.project`
pub const EE_PROJECT_ENV: &str = "GUSI_EE_PROJECT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub map: MapConfig,
    pub geocoding: GeocodingConfig,
    pub earth_engine: EarthEngineConfig,
    pub selector: SelectorConfig,
    /// Label of the period the seed rows were computed for
    pub seed_period: String,
    /// Reference cities every search is compared against
    pub seed: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory served as static files
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map file name, relative to `server.root`
    pub file: String,
    pub open_in_browser: bool,
    pub zoom: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub endpoint: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EarthEngineConfig {
    /// Cloud project billed for Earth Engine requests
    pub project: String,
    pub api_url: String,
    /// Cached OAuth credentials, as written by `earthengine authenticate`
    pub credentials_path: Option<PathBuf>,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub first_year: i32,
    pub last_year: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            map: MapConfig::default(),
            geocoding: GeocodingConfig::default(),
            earth_engine: EarthEngineConfig::default(),
            selector: SelectorConfig::default(),
            seed_period: "2024-10".to_string(),
            seed: default_seed(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000, root: PathBuf::from(".") }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self { file: "map.html".to_string(), open_in_browser: true, zoom: 12 }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            api_url: "https://earthengine.googleapis.com/v1".to_string(),
            credentials_path: None,
            oauth_client_id: String::new(),
            oauth_client_secret: String::new(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self { first_year: 2018, last_year: 2024 }
    }
}

/// Reference cities, computed for 2024-10
fn default_seed() -> Vec<ComparisonRow> {
    vec![
        ComparisonRow::new("New York", 0.23583329861041075, 633.9882109639525),
        ComparisonRow::new("Singapore", 0.10641166559503078, 1535.2876075699746),
        ComparisonRow::new("Geneva", 0.40702656960408284, 1662.0403757211448),
        ComparisonRow::new("Reykjavik", 0.26761786652820935, 1920.4101185115046),
        ComparisonRow::new("Helsinki", 0.1577286401005873, 1151.20550443919),
        ComparisonRow::new("Berlin", 0.45167407360320716, 893.4049136022957),
        ComparisonRow::new("Mumbai", 0.14118880234119496, 829.3112056261127),
        ComparisonRow::new("Beijing", 0.3546502680103287, 703.1508130982556),
        ComparisonRow::new("Tokyo", 0.2492380238311336, 958.6969784101211),
        ComparisonRow::new("Cape Town", 0.3488009536535482, 2560.929500607322),
    ]
}

impl Config {
    /// Load the user config file, falling back to defaults if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => {
                log::info!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Get the path where the config file is expected
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("gusi");
        path.push("config.toml");
        Some(path)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("📁 Config loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override secrets and project from the environment
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(GEOCODING_KEY_ENV).filter(|v| !v.is_empty()) {
            self.geocoding.api_key = key;
        }
        if let Some(project) = lookup(EE_PROJECT_ENV).filter(|v| !v.is_empty()) {
            self.earth_engine.project = project;
        }
    }

    /// Path of the generated map file on disk
    pub fn map_path(&self) -> PathBuf {
        self.server.root.join(&self.map.file)
    }

    /// Years offered by the time selector
    pub fn years(&self) -> Vec<i32> {
        (self.selector.first_year..=self.selector.last_year).collect()
    }
}
