//! Configuration types, loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::geolocation::PositionOptions;
use crate::worker::normalize_scope;

/// Offline cache manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Path prefix the worker controls.
    pub scope: String,
    /// Leading part of every cache generation name.
    pub cache_prefix: String,
    /// Version tag; bump it to force a new generation.
    pub version: String,
    /// Assets precached on install, relative to `scope`.
    pub static_assets: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scope: "/".to_string(),
            cache_prefix: "dubai-trip".to_string(),
            version: "v4".to_string(),
            static_assets: [
                "splash.png",
                "android/android-launchericon-192-192.png",
                "android/android-launchericon-512-512.png",
                "ios/180.png",
                "ios/152.png",
                "ios/167.png",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl WorkerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the version tag.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replaces the static asset list.
    #[must_use]
    pub fn with_static_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Absolute paths of the static assets under the scope.
    #[must_use]
    pub fn static_asset_paths(&self) -> Vec<String> {
        let scope = normalize_scope(&self.scope);
        self.static_assets
            .iter()
            .map(|asset| format!("{scope}{}", asset.trim_start_matches('/')))
            .collect()
    }
}

/// Proximity highlighting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Maximum distance, inclusive, for a stop to count as nearby.
    pub threshold_km: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_km: crate::highlight::DEFAULT_THRESHOLD_KM,
        }
    }
}

/// Local HTTP front configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Origin the worker fetches from, e.g. `https://example.github.io`.
    pub origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            origin: None,
        }
    }
}

/// Directories for cache and preference storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root of the on-disk cache storage.
    pub cache_dir: PathBuf,
    /// Directory holding persisted preferences.
    pub state_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            cache_dir: cache_dir.join("wayfarer"),
            state_dir: data_dir.join("wayfarer"),
        }
    }
}

impl PathConfig {
    /// File holding persisted preferences.
    #[must_use]
    pub fn prefs_file(&self) -> PathBuf {
        self.state_dir.join("prefs.json")
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Offline cache manager settings.
    pub worker: WorkerConfig,
    /// Proximity settings.
    pub proximity: ProximityConfig,
    /// One-shot position request options.
    pub geolocation: PositionOptions,
    /// HTTP front settings.
    pub server: ServerConfig,
    /// Storage directories.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wayfarer")
            .join("config.toml")
    }

    /// Loads configuration from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes configuration to `path` atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, toml::to_string(self)?)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Sets the worker configuration.
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    /// Sets the proximity threshold.
    #[must_use]
    pub const fn with_threshold_km(mut self, threshold_km: f64) -> Self {
        self.proximity.threshold_km = threshold_km;
        self
    }

    /// Sets the origin the worker fetches from.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.server.origin = Some(origin.into());
        self
    }
}
