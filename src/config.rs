use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from watchdog.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
#[derive(Default)]
pub struct WatchdogConfig {
    pub target: TargetConfig,
    pub inventory: InventoryConfig,
    pub log: LogConfig,
}

/// The process being kept alive and how to start it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    pub interpreter: PathBuf,
    pub script: PathBuf,
    /// Any of these appearing in the process inventory means the target is up.
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub image_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub file_name: String,
}

// --- Default implementations ---

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from(r"C:\Python\pythonw.exe"),
            script: PathBuf::from(r"C:\BackupManager\launcher.pyw"),
            markers: vec!["launcher.pyw".to_string(), "backup_manager".to_string()],
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            image_name: "pythonw.exe".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_name: "watchdog_error.log".to_string(),
        }
    }
}

impl WatchdogConfig {
    /// Parse a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Like [`load`](Self::load), but any error falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "invalid config, using defaults");
                Self::default()
            }
        }
    }

    /// Directory holding the target script.
    pub fn script_dir(&self) -> PathBuf {
        self.target
            .script
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// `<script dir>/<log.file_name>`
    pub fn error_log_path(&self) -> PathBuf {
        self.script_dir().join(&self.log.file_name)
    }
}

/// Errors from loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}
