use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use readguide_engine::{BatchSettings, ExtractSettings, GeneratorSettings, ModelEndpoint};
use readguide_logging::{guide_info, guide_warn};
use serde::{Deserialize, Serialize};

/// Read from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "readguide.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid listen address `{0}`")]
    ListenAddr(String),
}

/// Server settings, stored as RON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen_addr: String,
    pub output_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub concurrency: usize,
    pub max_source_bytes: u64,
    pub allowed_extensions: Vec<String>,
    /// Parent of the per-batch upload directories; the system temp dir when unset.
    pub upload_dir: Option<PathBuf>,
    /// Limit on a whole batch-import request body.
    pub max_upload_bytes: usize,
    pub default_model: Option<String>,
    pub models: Vec<ModelEndpoint>,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let extract = ExtractSettings::default();
        Self {
            listen_addr: "127.0.0.1:8086".to_string(),
            output_dir: PathBuf::from("./guides"),
            prompts_dir: PathBuf::from("./prompts"),
            concurrency: BatchSettings::default().concurrency,
            max_source_bytes: extract.max_bytes,
            allowed_extensions: extract.allowed_extensions,
            upload_dir: None,
            max_upload_bytes: 200 * 1024 * 1024,
            default_model: None,
            models: Vec::new(),
            log_file: None,
        }
    }
}

impl AppConfig {
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::ListenAddr(self.listen_addr.clone()))
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            concurrency: self.concurrency.max(1),
            ..BatchSettings::default()
        }
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings {
            max_bytes: self.max_source_bytes,
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            prompts_dir: self.prompts_dir.clone(),
            models: self.models.clone(),
            default_model: self.default_model.clone(),
            ..GeneratorSettings::default()
        }
    }
}

/// Load the config from `path`, or from [`DEFAULT_CONFIG_FILE`] when `path` is `None`.
///
/// An explicit path must exist. A missing default file yields the built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };

    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
            guide_info!("No config at {:?}, using defaults", path);
            return Ok(AppConfig::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let config: AppConfig = ron::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.clone(),
        message: err.to_string(),
    })?;
    if config.models.is_empty() {
        guide_warn!("Config {:?} defines no models; every job will fail", path);
    }
    guide_info!("Loaded config from {:?}", path);
    Ok(config)
}
