use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::app::View;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "IncidentDesk";
const APP_NAME: &str = "incident-desk";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_REPORTER: &str = "P/3 - 43° BPM";

/// Finds, creates and parses `config.toml`.
pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        ConfigPaths::discover().map(Self::from_paths)
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Loads the config, writing a default file first when none exists.
    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if self.paths.config_file.exists() {
            return self.load();
        }
        let mut cfg = AppConfig::default();
        cfg.post_load(&self.paths)?;
        self.write(&cfg)?;
        tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
        Ok(cfg)
    }

    pub fn load(&self) -> Result<AppConfig> {
        let path = &self.paths.config_file;
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write(&self, cfg: &AppConfig) -> Result<()> {
        let path = &self.paths.config_file;
        let body = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::File::create(path)
            .and_then(|mut file| file.write_all(body.as_bytes()))
            .with_context(|| format!("writing config {}", path.display()))
    }
}

/// Every location the application reads or writes.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub store_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    /// XDG locations, with `INCIDENT_DESK_CONFIG` (file or directory) and
    /// `INCIDENT_DESK_DATA` taking precedence.
    pub fn discover() -> Result<Self> {
        let dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let (config_dir, config_file) = match env::var_os("INCIDENT_DESK_CONFIG").map(PathBuf::from) {
            Some(path) if path.is_dir() => (path.clone(), path.join(CONFIG_FILE_NAME)),
            Some(path) => {
                let dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (dir, path)
            }
            None => {
                let dir = dirs.config_dir().to_path_buf();
                let file = dir.join(CONFIG_FILE_NAME);
                (dir, file)
            }
        };

        let data_dir = env::var_os("INCIDENT_DESK_DATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| dirs.data_dir().to_path_buf());
        let state_dir = match dirs.state_dir() {
            Some(dir) => dir.to_path_buf(),
            None => data_dir.join("state"),
        };

        Ok(Self {
            store_dir: data_dir.join("store"),
            backup_dir: data_dir.join("backups"),
            log_dir: state_dir.join("logs"),
            config_dir,
            config_file,
            data_dir,
            state_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        let dirs = [
            &self.config_dir,
            &self.data_dir,
            &self.store_dir,
            &self.backup_dir,
            &self.log_dir,
            &self.state_dir,
        ];
        dirs.into_iter().try_for_each(|dir| {
            fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))
        })
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(format!("{APP_NAME}.log"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identity stamped on newly registered incidents.
    pub reporter: String,
    pub storage: StorageOptions,
    pub search: SearchOptions,
    pub ui: UiOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reporter: DEFAULT_REPORTER.to_string(),
            storage: StorageOptions::default(),
            search: SearchOptions::default(),
            ui: UiOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.reporter.trim().is_empty() {
            tracing::warn!("empty reporter in config, falling back to default");
            self.reporter = DEFAULT_REPORTER.to_string();
        }
        if self.ui.initial_view == View::Form {
            tracing::warn!("form cannot be the initial view, using dashboard");
            self.ui.initial_view = View::Dashboard;
        }
        Ok(())
    }
}

/// What to do when a persisted document cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptPolicy {
    /// Back the document up and start from seed/empty data.
    Fallback,
    /// Refuse to start.
    Fail,
}

impl Default for CorruptPolicy {
    fn default() -> Self {
        CorruptPolicy::Fallback
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub store_dir: PathBuf,
    #[serde(skip)]
    pub backup_dir: PathBuf,
    pub seed_on_first_run: bool,
    pub on_corrupt: CorruptPolicy,
    pub backup_corrupt: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::new(),
            backup_dir: PathBuf::new(),
            seed_on_first_run: true,
            on_corrupt: CorruptPolicy::Fallback,
            backup_corrupt: true,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.store_dir.as_os_str().is_empty() {
            self.store_dir = paths.store_dir.clone();
        }
        if self.backup_dir.as_os_str().is_empty() {
            self.backup_dir = paths.backup_dir.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { max_results: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiOptions {
    pub initial_view: View,
    pub tick_rate_ms: u64,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            initial_view: View::Dashboard,
            tick_rate_ms: 250,
        }
    }
}

impl UiOptions {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(16))
    }
}
